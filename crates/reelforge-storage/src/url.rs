//! Public URL mapping for delivered artifacts.

/// Joins a configured base URL with a path relative to the storage root.
/// No signing or expiry -- the HTTP surface's range-enabled file streaming
/// handler is what actually serves the bytes; this just produces the URL a
/// client is told to fetch.
#[derive(Debug, Clone)]
pub struct PublicUrlMapper {
    base_url: String,
}

impl PublicUrlMapper {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn public_url(&self, relative_path: &std::path::Path) -> String {
        let rel = relative_path.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
        format!("{}/{}", self.base_url, rel.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn joins_base_and_relative_path_cleanly() {
        let mapper = PublicUrlMapper::new("https://cdn.example.com/");
        let url = mapper.public_url(&PathBuf::from("videos/u1/v1/final_720p.mp4"));
        assert_eq!(url, "https://cdn.example.com/videos/u1/v1/final_720p.mp4");
    }
}
