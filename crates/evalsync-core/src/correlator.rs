//! Request/response correlation under out-of-order delivery
//!
//! The transport delivers responses in arbitrary order relative to the
//! requests that produced them. The correlator assigns strictly
//! increasing ids to outbound requests and accepts an inbound response
//! only when its id is not older than the newest already applied, so a
//! stale evaluation can never overwrite a fresh one no matter when it
//! arrives. Tail responses win by id, not by arrival order; there is
//! no head-of-line blocking.

use crate::protocol::Response;

/// Per-session id counter and acceptance gate.
///
/// Created fresh for every session; never shared across a context
/// switch so the counter restarts at 0 with the new session.
#[derive(Debug, Default)]
pub struct Correlator {
    next_id: u64,
    last_applied: Option<u64>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current counter value, then increments it.
    /// The first id of a session is always 0.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Decides whether `response` may be applied.
    ///
    /// Accepts when nothing has been applied yet, or when the id is at
    /// least the newest applied one; records the id on acceptance.
    /// Rejected responses must be discarded unread by downstream
    /// components. Rejection is routine under network reordering, not
    /// an error condition.
    pub fn accept(&mut self, response: &Response) -> bool {
        self.accept_id(response.id)
    }

    /// Id-only variant of [`accept`](Self::accept), for callers that
    /// have not parsed a full response.
    pub fn accept_id(&mut self, id: u64) -> bool {
        match self.last_applied {
            Some(last) if id < last => false,
            _ => {
                self.last_applied = Some(id);
                true
            }
        }
    }

    /// Id of the newest applied response, if any.
    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(id: u64) -> Response {
        Response {
            id,
            ..Default::default()
        }
    }

    #[test]
    fn ids_are_monotonic_from_zero() {
        let mut c = Correlator::new();
        assert_eq!(c.next_id(), 0);
        assert_eq!(c.next_id(), 1);
        assert_eq!(c.next_id(), 2);
    }

    #[test]
    fn first_response_is_always_accepted() {
        let mut c = Correlator::new();
        assert!(c.accept(&resp(7)));
        assert_eq!(c.last_applied(), Some(7));
    }

    #[test]
    fn unsolicited_baseline_id_zero_is_accepted() {
        let mut c = Correlator::new();
        assert!(c.accept(&resp(0)));
    }

    #[test]
    fn stale_response_is_rejected() {
        let mut c = Correlator::new();
        assert!(c.accept(&resp(2)));
        assert!(!c.accept(&resp(1)));
        assert_eq!(c.last_applied(), Some(2));
    }

    #[test]
    fn duplicate_of_newest_id_is_still_accepted() {
        let mut c = Correlator::new();
        assert!(c.accept(&resp(4)));
        assert!(c.accept(&resp(4)));
    }

    #[test]
    fn convergence_is_delivery_order_independent() {
        // Any interleaving must end with the highest id applied.
        let orders: [&[u64]; 4] = [
            &[0, 1, 2, 3],
            &[3, 2, 1, 0],
            &[1, 3, 0, 2],
            &[2, 0, 3, 1],
        ];
        for order in orders {
            let mut c = Correlator::new();
            let mut applied = None;
            for &id in order {
                if c.accept(&resp(id)) {
                    applied = Some(id);
                }
            }
            assert_eq!(applied, Some(3), "delivery order {order:?}");
            assert_eq!(c.last_applied(), Some(3));
        }
    }

    #[test]
    fn late_duplicate_does_not_revert_state() {
        // send id 1, apply it; send id 2, apply it; a duplicate id 1
        // arriving afterwards must not win.
        let mut c = Correlator::new();
        assert!(c.accept(&resp(1)));
        assert!(c.accept(&resp(2)));
        assert!(!c.accept(&resp(1)));
        assert_eq!(c.last_applied(), Some(2));
    }
}
