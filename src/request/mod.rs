//! Request construction: validate → negotiate → encode → assemble
//!
//! Everything here is synchronous and side-effect free apart from logging.
//! A [`RequestDescriptor`] is the only thing handed to a transport.

mod assemble;
mod description;
mod encode;
mod negotiate;
mod types;
mod validation;

pub use assemble::{
    Advisory, NOSNIFF_HEADER, NOSNIFF_VALUE, RequestAssembler, RequestDescriptor, upgrade_scheme,
};
pub use description::{CredentialsDescription, DescriptionError, HeaderList, RequestDescription};
pub use encode::{EncodedBody, EncodingError, encode};
pub use negotiate::{CONTENT_TYPE, classify, declared_content_type, negotiate, select_strategy};
pub use types::{
    Credentials, EncodingStrategy, FormField, FormInput, Header, Method, RequestOptions,
};
pub use validation::{ValidatedOptions, ValidationError, validate};
