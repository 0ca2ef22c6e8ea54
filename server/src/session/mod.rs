pub mod dispatcher;
pub mod mailbox;
pub mod table;
pub mod worker;
