pub const CHANNEL_TYPES: &[char] = ['#', '&'].as_slice();
pub const CHANNEL_MEMBERSHIP_PREFIXES: &[char] = ['~', '&', '@', '%', '+'].as_slice();

pub const OP_PREFIX: char = '@';
pub const VOICE_PREFIX: char = '+';

pub const CTCP_DELIM: char = '\u{0001}';
