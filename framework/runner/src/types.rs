/// Recommended error type for your scenario `main` function. This type is compatible with the
/// error handling inside the runner so you can use `?` to propagate errors.
pub type SquallResult<T> = anyhow::Result<T>;
