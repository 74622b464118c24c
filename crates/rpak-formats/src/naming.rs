//! Container file naming
//!
//! Patches live next to their base container: patch number 0 is the base
//! file itself, number N is the base name with a two-digit `(NN)` suffix.

/// File extension of every container
pub const RPAK_EXTENSION: &str = ".rpak";

/// Strip the extension and any patch suffix from a container name
///
/// Only the file name part is touched; directories containing `.` or `(`
/// are left alone.
pub fn pak_stem(name: &str) -> &str {
    let file_start = name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let (dir, file) = name.split_at(file_start);

    let file = file.rfind('.').map_or(file, |dot| &file[..dot]);
    let file = file.rfind('(').map_or(file, |paren| &file[..paren]);
    &name[..dir.len() + file.len()]
}

/// Name of the base container a container belongs to
///
/// ```rust
/// use rpak_formats::naming::base_pak_name;
///
/// assert_eq!(base_pak_name("paks/Win64/common(02).rpak"), "paks/Win64/common.rpak");
/// ```
pub fn base_pak_name(name: &str) -> String {
    format!("{}{RPAK_EXTENSION}", pak_stem(name))
}

/// Name of patch `number` of the container `name`
pub fn patch_file_name(name: &str, number: u16) -> String {
    let stem = pak_stem(name);
    if number == 0 {
        format!("{stem}{RPAK_EXTENSION}")
    } else {
        format!("{stem}({number:02}){RPAK_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_file_names() {
        assert_eq!(patch_file_name("common.rpak", 0), "common.rpak");
        assert_eq!(patch_file_name("common.rpak", 1), "common(01).rpak");
        assert_eq!(patch_file_name("common(01).rpak", 12), "common(12).rpak");
        assert_eq!(patch_file_name("ui", 123), "ui(123).rpak");
    }

    #[test]
    fn test_stem_ignores_directories() {
        assert_eq!(pak_stem("paks/v1.2(old)/ui.rpak"), "paks/v1.2(old)/ui");
        assert_eq!(pak_stem("paks\\Win64\\ui(03).rpak"), "paks\\Win64\\ui");
        assert_eq!(base_pak_name("ui_mp(01).rpak"), "ui_mp.rpak");
    }
}
