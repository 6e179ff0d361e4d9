/// Implements `From<$t>` for an enum by wrapping the converted value into one of its variants.
macro_rules! attribute_from {
    ($target:ident :: $variant:ident <= $($t:ty),*) => ($(
        impl From<$t> for $target {
            fn from(value: $t) -> Self {
                Self::$variant(value.into())
            }
        }
    )*)
}
