pub mod callback_route;
pub mod login_route;
