/// Whoever vouches for the current user.
///
/// The home controller only reads the user once, while hydrating, and calls
/// [`Identity::revoke`] if the user record can't be found.
pub trait Identity {
    fn current_user(&self) -> Option<String>;
    fn revoke(&mut self);
}
