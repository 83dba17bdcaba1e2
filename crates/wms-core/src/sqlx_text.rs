//! Bridges the workspace's `as_str`/`parse` enums to Postgres `text`
//! columns so `sqlx::query_as` can decode/encode them directly, instead of
//! every caller round-tripping through `String` by hand.

/// Implement `sqlx::Type`/`Decode`/`Encode` for Postgres `text` in terms of
/// an enum's existing `as_str(self) -> &'static str` and
/// `parse(&str) -> Option<Self>` methods.
macro_rules! impl_pg_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                <$ty>::parse(&s).ok_or_else(|| format!("invalid {}: {s}", stringify!($ty)).into())
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(
                    &self.as_str().to_owned(),
                    buf,
                )
            }
        }
    };
}

pub(crate) use impl_pg_text_enum;
