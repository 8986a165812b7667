//! Transport building blocks shared by the controllers.

pub(crate) mod net;
