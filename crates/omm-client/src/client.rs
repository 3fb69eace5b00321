//! OMM AXI client.

use crate::axi::AxiMessage;
use crate::error::OmmError;
use crate::types::*;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_native_tls::native_tls;
use tracing::{debug, instrument, trace};

/// Records requested per page when listing users or devices.
const PAGE_SIZE: u32 = 20;

/// Byte stream an AXI session can run over.
pub trait AxiStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AxiStream for T {}

/// AXI session with an OpenMobility Manager.
///
/// Requests are strictly sequential on the single socket; the connection lock is held from
/// writing a request until its response has been read.
pub struct OmmClient {
    conn: Mutex<BufStream<Box<dyn AxiStream>>>,
    seq: AtomicU32,
}

impl OmmClient {
    /// Open a TLS connection to the OMM. The OMM ships a self-signed certificate, hence
    /// `accept_invalid_certs`.
    pub async fn connect(host: &str, port: u16, accept_invalid_certs: bool) -> Result<Self, OmmError> {
        let tcp = TcpStream::connect((host, port)).await?;
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .danger_accept_invalid_hostnames(accept_invalid_certs)
            .build()?;
        let tls = tokio_native_tls::TlsConnector::from(connector)
            .connect(host, tcp)
            .await?;

        debug!(host, port, "Connected to OMM");
        Ok(Self::from_stream(tls))
    }

    /// Run the protocol over an already established stream.
    pub fn from_stream<S: AxiStream + 'static>(stream: S) -> Self {
        let boxed: Box<dyn AxiStream> = Box::new(stream);
        Self {
            conn: Mutex::new(BufStream::new(boxed)),
            seq: AtomicU32::new(1),
        }
    }

    /// Send a request and wait for its `...Resp`.
    ///
    /// Unsolicited messages arriving in between are skipped.
    pub async fn request(&self, mut message: AxiMessage) -> Result<AxiMessage, OmmError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed).to_string();
        message.set_attr("seq", &seq);
        let expected = format!("{}Resp", message.name);

        let mut conn = self.conn.lock().await;
        write_frame(&mut conn, &message).await?;

        loop {
            let response = read_frame(&mut conn).await?;
            let seq_matches = response.get("seq").map_or(true, |s| s == seq);
            if response.name != expected || !seq_matches {
                trace!(name = %response.name, "Skipping unsolicited message");
                continue;
            }

            if let Some(code) = response.get("errCode") {
                return Err(OmmError::Rejected {
                    request: message.name,
                    code: code.to_string(),
                    info: response.get("info").unwrap_or_default().to_string(),
                });
            }
            return Ok(response);
        }
    }

    /// Authenticate the session. `user_device_sync` requests user/device sync client rights.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        user_device_sync: bool,
    ) -> Result<(), OmmError> {
        let mut open = AxiMessage::new("Open")
            .attr("username", username)
            .attr("password", password.expose_secret());
        if user_device_sync {
            open.set_attr("UserDeviceSyncClient", "true");
        }

        let response = self.request(open).await?;
        debug!(version = ?response.get("ommVersion"), "OMM login complete");
        Ok(())
    }

    /// End the session. The OMM does not answer `Close`.
    pub async fn logout(&self) -> Result<(), OmmError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut conn = self.conn.lock().await;
        write_frame(&mut conn, &AxiMessage::new("Close").attr("seq", seq)).await?;
        conn.shutdown().await?;
        debug!("OMM session closed");
        Ok(())
    }

    /// List users, optionally only those whose ownership tag matches.
    #[instrument(skip(self))]
    pub async fn list_users(&self, ownership_tag: Option<&str>) -> Result<Vec<DectUser>, OmmError> {
        let mut users = Vec::new();
        let mut start = 0u32;

        loop {
            let response = self
                .request(
                    AxiMessage::new("GetPPUser")
                        .attr("uid", start)
                        .attr("maxRecords", PAGE_SIZE),
                )
                .await?;

            let page = response
                .children_named("user")
                .map(DectUser::from_axi)
                .collect::<Result<Vec<_>, _>>()?;
            let exhausted = page.len() < PAGE_SIZE as usize;
            let Some(last_uid) = page.iter().map(|u| u.uid).max() else {
                break;
            };
            users.extend(page);
            if exhausted {
                break;
            }
            start = last_uid + 1;
        }

        if let Some(tag) = ownership_tag {
            users.retain(|u| u.ownership_tag == tag);
        }
        debug!("Listed {} users", users.len());
        Ok(users)
    }

    /// Fetch a single user by uid.
    pub async fn get_user(&self, uid: u32) -> Result<Option<DectUser>, OmmError> {
        let response = self
            .request(AxiMessage::new("GetPPUser").attr("uid", uid).attr("maxRecords", 1))
            .await?;

        for element in response.children_named("user") {
            let user = DectUser::from_axi(element)?;
            if user.uid == uid {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// First user whose `field` equals `value`.
    pub async fn find_user(&self, field: UserField, value: &str) -> Result<Option<DectUser>, OmmError> {
        let users = self.list_users(None).await?;
        Ok(users.into_iter().find(|u| field.matches(u, value)))
    }

    #[instrument(skip(self, user), fields(num = %user.num))]
    pub async fn create_user(&self, user: &NewDectUser) -> Result<DectUser, OmmError> {
        let response = self
            .request(AxiMessage::new("CreatePPUser").child(user.to_axi()))
            .await?;

        let created = response
            .children_named("user")
            .next()
            .ok_or_else(|| OmmError::Xml("CreatePPUserResp without <user>".into()))?;
        let uid: u32 = created
            .require("uid")?
            .parse()
            .map_err(|_| OmmError::Xml("CreatePPUserResp uid is not a number".into()))?;

        match self.get_user(uid).await? {
            Some(user) => Ok(user),
            None => DectUser::from_axi(created),
        }
    }

    #[instrument(skip(self, user), fields(uid = user.uid, num = %user.num))]
    pub async fn update_user(&self, user: &DectUser) -> Result<(), OmmError> {
        self.request(AxiMessage::new("SetPPUser").child(user.to_axi()))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, uid: u32) -> Result<(), OmmError> {
        self.request(AxiMessage::new("DeletePPUser").attr("uid", uid))
            .await
            .map(|_| ())
    }

    /// List all subscribed handsets.
    #[instrument(skip(self))]
    pub async fn list_devices(&self) -> Result<Vec<Device>, OmmError> {
        let mut devices = Vec::new();
        let mut start = 0u32;

        loop {
            let response = self
                .request(
                    AxiMessage::new("GetPPDev")
                        .attr("ppn", start)
                        .attr("maxRecords", PAGE_SIZE),
                )
                .await?;

            let page = response
                .children_named("pp")
                .map(Device::from_axi)
                .collect::<Result<Vec<_>, _>>()?;
            let exhausted = page.len() < PAGE_SIZE as usize;
            let Some(last_ppn) = page.iter().map(|d| d.ppn).max() else {
                break;
            };
            devices.extend(page);
            if exhausted {
                break;
            }
            start = last_ppn + 1;
        }

        debug!("Listed {} devices", devices.len());
        Ok(devices)
    }

    /// Bind a handset to a user.
    #[instrument(skip(self))]
    pub async fn attach_device(&self, uid: u32, ppn: u32) -> Result<(), OmmError> {
        self.set_relation(uid, ppn, DeviceRelation::Fixed).await
    }

    /// Release a handset from a user.
    #[instrument(skip(self))]
    pub async fn detach_device(&self, uid: u32, ppn: u32) -> Result<(), OmmError> {
        self.set_relation(uid, ppn, DeviceRelation::Unbound).await
    }

    async fn set_relation(&self, uid: u32, ppn: u32, relation: DeviceRelation) -> Result<(), OmmError> {
        self.request(
            AxiMessage::new("SetPPUserDevRelation")
                .attr("uid", uid)
                .attr("ppn", ppn)
                .attr("relType", relation.as_str()),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_subscription(&self, mode: SubscriptionMode) -> Result<(), OmmError> {
        self.request(AxiMessage::new("SetDECTSubscriptionMode").attr("mode", mode))
            .await
            .map(|_| ())
    }
}

async fn write_frame(
    conn: &mut BufStream<Box<dyn AxiStream>>,
    message: &AxiMessage,
) -> Result<(), OmmError> {
    let mut frame = message.encode().into_bytes();
    frame.push(0);
    conn.write_all(&frame).await?;
    conn.flush().await?;
    Ok(())
}

async fn read_frame(conn: &mut BufStream<Box<dyn AxiStream>>) -> Result<AxiMessage, OmmError> {
    let mut buf = Vec::new();
    let read = conn.read_until(0, &mut buf).await?;
    if read == 0 {
        return Err(OmmError::ConnectionClosed);
    }
    if buf.last() == Some(&0) {
        buf.pop();
    }
    let text = String::from_utf8(buf).map_err(|e| OmmError::Xml(e.to_string()))?;
    AxiMessage::decode(&text)
}
