pub const RPL_WELCOME: u16 = 1;
pub const RPL_TOPIC: u16 = 332;
pub const RPL_WHOREPLY: u16 = 352;
pub const RPL_NAMREPLY: u16 = 353;
pub const ERR_NICKNAMEINUSE: u16 = 433;
