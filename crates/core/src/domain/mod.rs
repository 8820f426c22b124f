pub mod certificate;
pub mod cost;
pub mod notification;
pub mod request;
pub mod user;
