pub mod apply;
pub mod init;
