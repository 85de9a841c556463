macro_rules! debug_warn {
    ($($x:tt)*) => {
        {
            #[cfg(debug_assertions)]
            {
                tracing::warn!($($x)*)
            }
            #[cfg(not(debug_assertions))]
            {
                _ = format_args!($($x)*);
            }
        }
    };
}

pub(crate) use debug_warn;

/// Builds a [`Record`](crate::Record) from key/value pairs. Values take
/// anything `Into<Value>`; the record starts plain and becomes reactive
/// when [`observe`](crate::observe)d.
///
/// ```
/// # use vine_reactive::*;
/// let user = record! {
///     "name" => "ada",
///     "logins" => 3,
///     "tags" => seq!["admin", "ops"],
/// };
/// assert_eq!(user.get_untracked("logins"), Value::from(3));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let record = $crate::Record::new();
        $(record.insert($key, $crate::Value::from($value));)+
        record
    }};
}

/// Builds a [`Seq`](crate::Seq) from values. See [`record!`].
#[macro_export]
macro_rules! seq {
    () => { $crate::Seq::new() };
    ($($value:expr),+ $(,)?) => {
        <$crate::Seq as ::std::iter::FromIterator<$crate::Value>>::from_iter(
            [$($crate::Value::from($value)),+]
        )
    };
}
