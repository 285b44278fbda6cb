pub mod question;
pub mod session;
pub mod turn;
