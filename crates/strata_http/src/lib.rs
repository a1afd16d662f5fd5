pub mod client;
pub mod error;
pub mod pagination;
pub mod retry;
pub mod transport;

pub use client::{ApiClient, Authorizer, BearerToken, NoAuth, SswsToken};
pub use error::{HttpError, Result};
pub use pagination::{Pages, next_link};
pub use retry::{Clock, RetryPolicy, TokioClock};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, RequestBody, Transport};

pub use reqwest::{Method, StatusCode, header};
