use std::path::Path;
use uuid::Uuid;

/// Build an upload path function that stores every file under `dirname`
/// with a random UUID name, keeping the lowercased extension.
///
/// ```
/// let upload_to = modelkit::upload::uuid_upload_to("avatars");
/// let path = upload_to("Portrait.JPG");
/// assert!(path.starts_with("avatars/"));
/// assert!(path.ends_with(".jpg"));
/// ```
pub fn uuid_upload_to(dirname: impl Into<String>) -> impl Fn(&str) -> String + Clone + Send + Sync {
    let dirname = dirname.into();
    move |filename: &str| {
        let ext = filename.rsplit('.').next().unwrap_or(filename).to_lowercase();
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        Path::new(&dirname).join(name).to_string_lossy().into_owned()
    }
}
