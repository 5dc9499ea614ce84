use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Embed the Windows manifest. Posting messages to an elevated emulator
    // needs the same integrity level.
    let _ = embed_resource::compile("mff-auto.rc", embed_resource::NONE);

    // Copy reference images and default settings next to the executable
    copy_templates();
    copy_settings();
}

/// Returns the target profile directory (target/debug or target/release).
fn target_dir() -> Option<std::path::PathBuf> {
    let out_dir = env::var("OUT_DIR").ok()?;
    // OUT_DIR is target/<profile>/build/mff-auto-xxx/out
    Path::new(&out_dir)
        .ancestors()
        .nth(3)
        .map(|p| p.to_path_buf())
}

/// Copies the template folder so the executable can find reference images.
fn copy_templates() {
    let Some(target_dir) = target_dir() else {
        return;
    };

    let template_src = Path::new("resources/templates");
    let template_dst = target_dir.join("resources").join("templates");

    if template_src.exists() {
        copy_dir_recursive(template_src, &template_dst);
        println!("cargo:rerun-if-changed=resources/templates/");
    }
}

/// Copies default settings files, never overwriting ones the user changed.
fn copy_settings() {
    let Some(target_dir) = target_dir() else {
        return;
    };

    let settings_src = Path::new("settings/gui");
    let settings_dst = target_dir.join("settings").join("gui");

    if settings_src.exists() {
        let _ = fs::create_dir_all(&settings_dst);
        if let Ok(entries) = fs::read_dir(settings_src) {
            for entry in entries.flatten() {
                let dst = settings_dst.join(entry.file_name());
                if !dst.exists() {
                    let _ = fs::copy(entry.path(), dst);
                }
            }
        }
        println!("cargo:rerun-if-changed=settings/gui/");
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}
