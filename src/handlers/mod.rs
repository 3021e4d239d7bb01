pub mod workboards;
