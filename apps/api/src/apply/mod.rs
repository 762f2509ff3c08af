// Application intake: multipart form → validated record → store → notifications.

pub mod form;
pub mod handlers;
pub mod repository;
