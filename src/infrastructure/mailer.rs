pub mod forwarder;
pub mod resend;
pub mod smtp;
