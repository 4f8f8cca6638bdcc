use std::env;

fn main() {
    // 告诉 cargo 在 build.rs 变化时重新运行
    println!("cargo:rerun-if-changed=build.rs");

    // 主机端测试不需要链接脚本
    let target = env::var("TARGET").unwrap_or_default();
    if !target.starts_with("xtensa-") {
        return;
    }

    // 固件链接脚本由 esp-hal 提供, 此处仅追加自定义 ld 目录
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rustc-link-search={}/ld", manifest_dir);
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
