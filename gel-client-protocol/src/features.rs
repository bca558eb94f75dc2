/// Protocol version negotiated during the handshake.
///
/// The client starts at [`ProtocolVersion::current`] and accepts anything
/// the server proposes down to [`ProtocolVersion::minimum`]. Version
/// checks gate the legacy (0.x) and v2 encodings of descriptors and of a
/// few messages; the value codecs themselves do not change across
/// versions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub(crate) major_ver: u16,
    pub(crate) minor_ver: u16,
}

impl ProtocolVersion {
    pub fn current() -> ProtocolVersion {
        ProtocolVersion {
            major_ver: 1,
            minor_ver: 0,
        }
    }
    pub fn minimum() -> ProtocolVersion {
        ProtocolVersion {
            major_ver: 0,
            minor_ver: 13,
        }
    }
    pub fn new(major_ver: u16, minor_ver: u16) -> ProtocolVersion {
        ProtocolVersion {
            major_ver,
            minor_ver,
        }
    }
    pub fn version_tuple(&self) -> (u16, u16) {
        (self.major_ver, self.minor_ver)
    }
    /// Protocol 1.0 or newer.
    pub fn is_1(&self) -> bool {
        self.major_ver >= 1
    }
    /// Protocol 2.0 or newer: length-prefixed descriptor blocks with
    /// names and ancestor chains.
    pub fn is_2(&self) -> bool {
        self.major_ver >= 2
    }
    pub fn supports_inline_typenames(&self) -> bool {
        self.is_at_least(0, 9)
    }
    pub fn has_implicit_tid(&self) -> bool {
        !self.is_1()
    }
    pub fn has_implicit_id(&self) -> bool {
        !self.is_1()
    }
    pub fn is_at_least(&self, major_ver: u16, minor_ver: u16) -> bool {
        self.major_ver > major_ver || self.major_ver == major_ver && self.minor_ver >= minor_ver
    }
    pub fn is_at_most(&self, major_ver: u16, minor_ver: u16) -> bool {
        self.major_ver < major_ver || self.major_ver == major_ver && self.minor_ver <= minor_ver
    }
}

#[cfg(test)]
mod tests {
    use super::ProtocolVersion;

    #[test]
    fn ordering_helpers() {
        let legacy = ProtocolVersion::new(0, 13);
        assert!(!legacy.is_1());
        assert!(legacy.is_at_least(0, 10));
        assert!(legacy.is_at_most(1, 0));
        assert!(ProtocolVersion::current().is_1());
        assert!(!ProtocolVersion::current().is_2());
        assert!(ProtocolVersion::new(2, 0).is_2());
    }
}
