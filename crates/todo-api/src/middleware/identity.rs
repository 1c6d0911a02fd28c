//! Cookie による匿名ユーザー識別
//!
//! すべてのリクエストで識別 Cookie を読み、無い（または空の）場合は新しいトークンを
//! 発行して `Set-Cookie` で返す。解決したユーザーはリクエスト拡張に `CurrentUser`
//! として載せ、ハンドラーは抽出子で受け取る。リクエストを拒否することは無い。

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{InvalidHeaderValue, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request, Response};
use cookie::Cookie;
use domain::UserId;
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::error::ApiError;

/// 識別 Cookie の有効期間
pub const IDENTITY_MAX_AGE: time::Duration = time::Duration::days(1);

/// ハンドラーに渡される呼び出し元のユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// 識別 Cookie の名前と属性
#[derive(Debug, Clone)]
pub struct IdentityCookie {
    name: Arc<str>,
}

impl IdentityCookie {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// リクエストの Cookie ヘッダー（複数可）から識別トークンを読む。空値は未設定扱い
    pub fn read(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.name())
            .and_then(|cookie| UserId::from_string(cookie.value_trimmed().to_string()).ok())
    }

    /// `Path=/`・24 時間・HttpOnly（Secure は付けない）
    pub fn set_cookie_value(&self, user_id: &UserId) -> Result<HeaderValue, InvalidHeaderValue> {
        let cookie = Cookie::build((self.name(), user_id.as_str()))
            .path("/")
            .max_age(IDENTITY_MAX_AGE)
            .http_only(true)
            .secure(false)
            .build();
        HeaderValue::from_str(&cookie.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct IdentityLayer {
    cookie: IdentityCookie,
}

impl IdentityLayer {
    pub fn new(cookie: IdentityCookie) -> Self {
        Self { cookie }
    }
}

impl<S> Layer<S> for IdentityLayer {
    type Service = IdentityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdentityService {
            inner,
            cookie: self.cookie.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityService<S> {
    inner: S,
    cookie: IdentityCookie,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for IdentityService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let (user_id, issued) = match self.cookie.read(request.headers()) {
            Some(user_id) => (user_id, None),
            None => {
                let user_id = UserId::generate();
                debug!(user_id = %user_id, "新しい識別トークンを発行しました");
                let header = match self.cookie.set_cookie_value(&user_id) {
                    Ok(header) => Some(header),
                    Err(e) => {
                        error!(
                            error = %e,
                            cookie = %self.cookie.name(),
                            "Set-Cookie ヘッダーを組み立てられません"
                        );
                        None
                    }
                };
                (user_id, header)
            }
        };

        request.extensions_mut().insert(CurrentUser(user_id));

        // ready 済みのサービスで呼び出す
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            if let Some(header) = issued {
                response.headers_mut().append(SET_COOKIE, header);
            }
            Ok(response)
        })
    }
}
