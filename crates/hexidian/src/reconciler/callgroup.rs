use super::Reconciler;
use crate::backend::BackendError;
use crate::events::CallGroupUpdate;
use tracing::{info, warn};

impl Reconciler {
    /// Bring the group's membership to the active set of `update`.
    pub(super) async fn update_callgroup(&self, update: &CallGroupUpdate) -> Result<(), BackendError> {
        let Some(group) = self.router.callgroup(&update.number).await? else {
            warn!(number = %update.number, "Membership update for unknown call group");
            return Ok(());
        };

        let desired = update.desired_members();
        let mut added = 0;
        let mut removed = 0;

        for extension in desired.difference(&group.members) {
            self.router
                .add_callgroup_member(&group.number, extension)
                .await?;
            added += 1;
        }
        for extension in group.members.difference(&desired) {
            self.router
                .remove_callgroup_member(&group.number, extension)
                .await?;
            removed += 1;
        }

        info!(number = %group.number, added, removed, "Updated call group members");
        Ok(())
    }
}
