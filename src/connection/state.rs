//! Connection state bitmask.

use bitflags::bitflags;

bitflags! {
    /// Connection lifecycle bits.
    ///
    /// Exactly one of `DISCONNECTED`, `DISCONNECTING`, `CONNECTING` and `ACTIVE`
    /// is the primary state; `INIT_SENT` and `RECV_NAMES` combine freely with it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ConnState: u32 {
        const UNKNOWN = 0x00;
        const DISCONNECTED = 0x01;
        const DISCONNECTING = 0x02;
        const CONNECTING = 0x04;
        const ACTIVE = 0x08;
        /// The registration handshake has been queued.
        const INIT_SENT = 0x10;
        /// A NAMES burst is being received.
        const RECV_NAMES = 0x80;
    }
}

impl ConnState {
    const PRIMARY: Self = Self::DISCONNECTED
        .union(Self::DISCONNECTING)
        .union(Self::CONNECTING)
        .union(Self::ACTIVE);

    /// Replace the primary state, keeping the independent bits.
    #[inline]
    pub const fn with_primary(self, primary: Self) -> Self {
        self.difference(Self::PRIMARY)
            .union(primary.intersection(Self::PRIMARY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_replacement_keeps_flags() {
        let s = ConnState::CONNECTING | ConnState::INIT_SENT;
        let s = s.with_primary(ConnState::ACTIVE);
        assert!(s.contains(ConnState::ACTIVE));
        assert!(s.contains(ConnState::INIT_SENT));
        assert!(!s.contains(ConnState::CONNECTING));
        assert_eq!(s.bits(), 0x18);
    }

    #[test]
    fn intersects_any_bit() {
        let s = ConnState::CONNECTING;
        assert!(s.intersects(ConnState::ACTIVE | ConnState::CONNECTING));
        assert!(!s.intersects(ConnState::DISCONNECTED));
        assert!(ConnState::UNKNOWN.is_empty());
    }

    #[test]
    fn raw_bits_survive_the_atomic_round_trip() {
        let s = ConnState::ACTIVE | ConnState::RECV_NAMES;
        assert_eq!(ConnState::from_bits_retain(s.bits()), s);
        assert_eq!(ConnState::DISCONNECTED.with_primary(ConnState::UNKNOWN), ConnState::UNKNOWN);
    }
}
