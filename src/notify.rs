use log::info;
use uuid::Uuid;

use crate::domain::pass::Pass;

/// Outbound visitor message produced by the booking and lifecycle flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Confirmation link for a freshly committed booking.
    BookingConfirmed { registration_number: String, email: String },
    /// The pass was cancelled (by the visitor or an administrator).
    BookingCancelled { registration_number: String, email: String },
    /// A capacity reduction marked the pass as overbooked.
    Overbooked { registration_number: String, email: String },
}

impl Notification {
    pub fn confirmed(pass: &Pass) -> Option<Notification> {
        pass.visitor.email.clone().map(|email| Notification::BookingConfirmed {
            registration_number: pass.registration_number.clone(),
            email,
        })
    }

    pub fn cancelled(pass: &Pass) -> Option<Notification> {
        pass.visitor.email.clone().map(|email| Notification::BookingCancelled {
            registration_number: pass.registration_number.clone(),
            email,
        })
    }

    pub fn overbooked(pass: &Pass) -> Option<Notification> {
        pass.visitor.email.clone().map(|email| Notification::Overbooked {
            registration_number: pass.registration_number.clone(),
            email,
        })
    }
}

/// Delivery seam for visitor notifications.
///
/// Dispatch is fire-and-forget: a delivery failure is logged and never
/// propagated, because the booking it accompanies has already committed.
pub trait Notifier: std::fmt::Debug + Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Default notifier; writes each message to the log instead of an
/// outbound channel.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, notification: Notification) {
        let dispatch_id = Uuid::new_v4();
        match notification {
            Notification::BookingConfirmed { registration_number, email } => {
                info!("[{dispatch_id}] Booking {registration_number} confirmed, notifying {email}");
            }
            Notification::BookingCancelled { registration_number, email } => {
                info!("[{dispatch_id}] Booking {registration_number} cancelled, notifying {email}");
            }
            Notification::Overbooked { registration_number, email } => {
                info!("[{dispatch_id}] Pass {registration_number} overbooked, notifying {email}");
            }
        }
    }
}

pub mod mock {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Captures dispatched notifications for assertions.
    #[derive(Debug, Default, Clone)]
    pub struct MockNotifier {
        pub sent: Arc<Mutex<Vec<Notification>>>,
    }

    impl Notifier for MockNotifier {
        fn dispatch(&self, notification: Notification) {
            self.sent.lock().unwrap().push(notification);
        }
    }
}
