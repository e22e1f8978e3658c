use crate::error::{OcrSyncError, Result};
use crate::store::ImageSource;
use ocr_sheet_common::MediaType;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 対応画像のパスとメディアタイプ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePath {
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: MediaType,
}

fn image_path(path: &Path) -> Option<ImagePath> {
    let media_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(MediaType::from_extension)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Some(ImagePath {
        path: path.to_path_buf(),
        file_name,
        media_type,
    })
}

/// フォルダ直下の対応画像を列挙（ファイル名順）
pub fn scan_folder(folder: &Path) -> Result<Vec<ImagePath>> {
    if !folder.is_dir() {
        return Err(OcrSyncError::FileNotFound(folder.display().to_string()));
    }

    let mut images: Vec<ImagePath> = WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| image_path(e.path()))
        .collect();

    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(images)
}

/// 指定されたファイル・フォルダから画像を集める
///
/// 指定順を保ち、フォルダの中身はファイル名順に展開する。
/// 対応していない拡張子のファイルは警告して読み飛ばす。
pub fn collect_images(paths: &[PathBuf]) -> Result<Vec<ImagePath>> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_dir() {
            images.extend(scan_folder(path)?);
        } else if path.is_file() {
            match image_path(path) {
                Some(image) => images.push(image),
                None => warn!(path = %path.display(), "対応していない画像形式のためスキップ"),
            }
        } else {
            return Err(OcrSyncError::FileNotFound(path.display().to_string()));
        }
    }

    debug!(count = images.len(), "画像を検出");
    Ok(images)
}

/// 画像を読み込んでストアに渡せる形にする
pub fn load_image(image: &ImagePath) -> Result<ImageSource> {
    let bytes = std::fs::read(&image.path)?;
    Ok(ImageSource::new(image.file_name.clone(), image.media_type, bytes))
}

pub fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageSource>> {
    let images = collect_images(paths)?;
    if images.is_empty() {
        let joined = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(OcrSyncError::NoImagesFound(joined));
    }
    images.iter().map(load_image).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"));
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_folder_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = scan_folder(temp_dir.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_scan_folder_with_images() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();

        File::create(dir.join("test1.jpg")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.join("test2.JPG")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.join("test3.png")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.join("test4.webp")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.join("readme.txt")).unwrap().write_all(b"text").unwrap();

        let result = scan_folder(dir).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[0].file_name, "test1.jpg");
        assert_eq!(result[1].file_name, "test2.JPG");
        assert_eq!(result[1].media_type, MediaType::Jpeg);
        assert_eq!(result[2].media_type, MediaType::Png);
        assert_eq!(result[3].media_type, MediaType::Webp);
    }

    #[test]
    fn test_collect_images_keeps_argument_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        fs::create_dir(dir.join("folder")).unwrap();
        File::create(dir.join("folder").join("b.png")).unwrap();
        File::create(dir.join("folder").join("a.png")).unwrap();
        File::create(dir.join("z.jpg")).unwrap();
        File::create(dir.join("notes.txt")).unwrap();

        let result = collect_images(&[
            dir.join("z.jpg"),
            dir.join("folder"),
            dir.join("notes.txt"),
        ])
        .unwrap();
        let names: Vec<&str> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["z.jpg", "a.png", "b.png"]);
    }

    #[test]
    fn test_collect_images_missing_path() {
        let result = collect_images(&[PathBuf::from("/nonexistent/image.png")]);
        assert!(matches!(result, Err(OcrSyncError::FileNotFound(_))));
    }

    #[test]
    fn test_load_images_reads_bytes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("a.png");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        let sources = load_images(&[path]).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].file_name, "a.png");
        assert_eq!(&*sources[0].bytes, &[1u8, 2, 3]);
    }

    #[test]
    fn test_load_images_none_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_images(&[temp_dir.path().to_path_buf()]);
        assert!(matches!(result, Err(OcrSyncError::NoImagesFound(_))));
    }
}
