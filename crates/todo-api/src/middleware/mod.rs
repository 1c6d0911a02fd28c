mod identity;

pub use identity::{
    CurrentUser, IdentityCookie, IdentityLayer, IdentityService, IDENTITY_MAX_AGE,
};
