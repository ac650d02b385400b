//! Adapters from the collaborator ports in `sweepr-common` onto real transports.

pub mod ldap;
pub mod powershell;
pub mod webdriver;
