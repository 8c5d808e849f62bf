use url::Url;

/// Make `url` usable as a base for `Url::join`, which otherwise replaces the
/// last path segment (`/blog` + `auth/callback` would give `/auth/callback`).
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
