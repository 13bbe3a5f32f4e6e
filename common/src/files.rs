/// Extensiones que acepta el convertidor (libros de Excel).
pub const ALLOWED_EXTENSIONS: [&str; 2] = [".xls", ".xlsx"];

/// Extensión en minúsculas con el punto incluido, tomada después del último `.`.
///
/// Un nombre sin punto no tiene extensión.
pub fn extension_of(file_name: &str) -> Option<String> {
    let idx = file_name.rfind('.')?;
    Some(file_name[idx..].to_lowercase())
}

pub fn is_allowed_file_name(file_name: &str) -> bool {
    match extension_of(file_name) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}
