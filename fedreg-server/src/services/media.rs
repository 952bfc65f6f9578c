//! File name and media type helpers for uploads

/// Lowercase extension after the last `.`, if any
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Extension of `filename` if it is in `allowed`
pub fn allowed_extension(filename: &str, allowed: &[&str]) -> Option<String> {
    file_extension(filename).filter(|ext| allowed.contains(&ext.as_str()))
}

/// MIME type for an image extension
pub fn image_mime_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("x.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("scan.final.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_allowed_extension() {
        let allowed = ["png", "jpg", "jpeg", "bmp"];
        assert_eq!(allowed_extension("chest.Jpg", &allowed).as_deref(), Some("jpg"));
        assert_eq!(allowed_extension("chest.gif", &allowed), None);
        assert_eq!(allowed_extension("chest.dcm", &allowed), None);
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type("png"), "image/png");
        assert_eq!(image_mime_type("jpg"), "image/jpeg");
        assert_eq!(image_mime_type("bmp"), "image/bmp");
    }
}
