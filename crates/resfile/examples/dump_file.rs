//! Simple decoder to inspect FRES resource files.

use std::fs;
use resfile::{decode_res_file, AnimCurve, UserDataValue};

fn format_values(value: &UserDataValue) -> String {
    match value {
        UserDataValue::Int32(v) => format!("INT32{:?}", v),
        UserDataValue::Single(v) => format!("SINGLE{:?}", v),
        UserDataValue::Byte(v) => format!("BYTES[{}]", v.len()),
        UserDataValue::String(v) | UserDataValue::WString(v) => {
            let preview: Vec<&str> = v.iter().take(4).map(String::as_str).collect();
            if v.len() > 4 {
                format!("{:?}...", preview)
            } else {
                format!("{:?}", preview)
            }
        }
    }
}

fn format_curve(curve: &AnimCurve) -> String {
    format!(
        "{:?} frames={} keys={} range={}..{}",
        curve.curve_type,
        curve.frames.len(),
        curve.keys.len(),
        curve.start_frame,
        curve.end_frame
    )
}

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: dump_file <path.bfres>");
        std::process::exit(2);
    };

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let file = decode_res_file(&data).expect("Failed to decode");

    println!("\n=== File Info ===");
    println!("Name: {}", file.name);
    println!("Version: {:#010x}", file.version);

    println!("\n=== Materials ({}) ===", file.materials.len());
    for (name, material) in file.materials.iter() {
        let mode = material
            .render_state
            .as_ref()
            .map(|state| format!("{:?}", state.mode))
            .unwrap_or_else(|| "none".to_string());
        println!(
            "  {} (visible={}, render={}, samplers={})",
            name,
            material.is_visible(),
            mode,
            material.samplers.len()
        );
        for (key, data) in material.user_data.iter() {
            println!("    {} = {}", key, format_values(&data.value));
        }
    }

    println!("\n=== Skeletal Animations ({}) ===", file.skeletal_anims.len());
    for (name, anim) in file.skeletal_anims.iter() {
        println!(
            "  {} ({} frames, {} bones, {} curves)",
            name,
            anim.frame_count,
            anim.bone_anims.len(),
            anim.curve_count()
        );
        for bone in anim.bone_anims.iter().take(8) {
            println!("    {} (begin_curve={})", bone.name, bone.begin_curve);
            for curve in &bone.curves {
                println!("      {}", format_curve(curve));
            }
        }
        if anim.bone_anims.len() > 8 {
            println!("    ... {} more", anim.bone_anims.len() - 8);
        }
    }

    println!("\n=== External Files ({}) ===", file.external_files.len());
    for (name, external) in file.external_files.iter() {
        println!("  {} ({} bytes)", name, external.data.len());
    }

    println!("\n=== User Data ({}) ===", file.user_data.len());
    for (name, data) in file.user_data.iter() {
        println!("  {} = {}", name, format_values(&data.value));
    }
}
