use std::time::Duration;

use super::{Module, Subtree};
use crate::core::Result;

/// Generates the three getter shapes for each listed type.
///
/// Expands inside an `impl` block whose type provides the generic `get`,
/// `get_if_exists` and `get_or` methods.
///
/// - `<err>(path)` returns every failure
/// - `<if_exists>(path)` returns `None` when absent or invalid
/// - `<or>(path, default)` falls back to `default`
macro_rules! typed_getters {
    ($($ty:ty => $err:ident, $if_exists:ident, $or:ident;)+) => {
        $(
            #[doc = concat!("Reads `path` as `", stringify!($ty), "`.")]
            ///
            /// # Errors
            /// Returns `ConfError::NotFound` for an absent path, and the
            /// format or decode error otherwise.
            pub fn $err(&self, path: &str) -> Result<$ty> {
                self.get::<$ty>(path)
            }

            #[doc = concat!("Reads `path` as `", stringify!($ty), "` if it is present and valid.")]
            pub fn $if_exists(&self, path: &str) -> Option<$ty> {
                self.get_if_exists::<$ty>(path)
            }

            #[doc = concat!("Reads `path` as `", stringify!($ty), "`, falling back to `default`.")]
            pub fn $or(&self, path: &str, default: impl Into<$ty>) -> $ty {
                self.get_or::<$ty>(path, default.into())
            }
        )+
    };
}

macro_rules! impl_typed_getters {
    ($target:ty) => {
        impl $target {
            typed_getters! {
                String => get_string_err, get_string_if_exists, get_string;
                i64 => get_int_err, get_int_if_exists, get_int;
                bool => get_bool_err, get_bool_if_exists, get_bool;
                Duration => get_duration_err, get_duration_if_exists, get_duration;
                f64 => get_float_err, get_float_if_exists, get_float;
                Vec<String> => get_strings_err, get_strings_if_exists, get_strings;
            }
        }
    };
}

impl_typed_getters!(Module);
impl_typed_getters!(Subtree);
