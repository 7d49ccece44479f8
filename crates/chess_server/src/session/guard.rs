use crate::controller::GameController;
use crate::messaging::{PlayerLeft, SpectatorLeft};
use std::sync::Arc;
use tracing::{debug, warn};

/// The notification owed to the controller once a join succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LeaveNotice {
    Player(PlayerLeft),
    Spectator(SpectatorLeft),
}

impl LeaveNotice {
    async fn deliver(self, controller: &dyn GameController) {
        debug!("Delivering leave notice {:?}", self);
        match self {
            LeaveNotice::Player(left) => controller.player_leave(left).await,
            LeaveNotice::Spectator(left) => controller.spectator_leave(left).await,
        }
    }
}

/// Session membership acquired by a successful join.
///
/// Call [`LeaveGuard::release`] when the session ends. If the guard is
/// dropped without being released (the session future was cancelled), the
/// notice is handed to the runtime instead. Either way it is sent once.
pub(crate) struct LeaveGuard {
    controller: Arc<dyn GameController>,
    notice: Option<LeaveNotice>,
}

impl LeaveGuard {
    pub(crate) fn new(controller: Arc<dyn GameController>, notice: LeaveNotice) -> Self {
        Self {
            controller,
            notice: Some(notice),
        }
    }

    pub(crate) async fn release(mut self) {
        if let Some(notice) = self.notice.take() {
            notice.deliver(self.controller.as_ref()).await;
        }
    }
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let Some(notice) = self.notice.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let controller = self.controller.clone();
                handle.spawn(async move {
                    notice.deliver(controller.as_ref()).await;
                });
            }
            Err(_) => warn!("Leave notice {:?} lost: no runtime to deliver it", notice),
        }
    }
}
