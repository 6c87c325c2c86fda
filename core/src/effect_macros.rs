//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Future` from an async block
///
/// The block must evaluate to `Option<Action>`.
///
/// # Example
///
/// ```rust,ignore
/// use backstage_core::async_effect;
///
/// async_effect! {
///     match gateway.send(request).await {
///         Ok(body) => Some(EntityAction::Listed { seq, body }),
///         Err(error) => Some(EntityAction::Failed { op, seq, error: error.into() }),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}
