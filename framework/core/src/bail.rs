/// Return this error from a virtual user's request loop to indicate that the user is bailing.
///
/// This should be used when a virtual user hits a problem that is not fatal to the run as a
/// whole. For example, a user that keeps failing to reach the target can take itself out of the
/// pool while the remaining users carry on generating load.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct UserBailError {
    msg: String,
}

impl Default for UserBailError {
    fn default() -> Self {
        Self {
            msg: "Virtual user is bailing".to_string(),
        }
    }
}
