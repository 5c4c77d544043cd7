//! Test utilities for codeharvest-extract

use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// A small repository: four C files (one under `vendor/keep`, one directly
/// under `vendor`) and one Rust file.
///
/// Function uids with the repo as root:
/// `src/main.c::main`, `src/main.c::square`, `src/util.h::clamp`,
/// `vendor/drop.c::dropped`, `vendor/keep/keep.c::kept`,
/// `src/shapes.rs::area`, `src/shapes.rs::Circle.new`, `src/shapes.rs::Circle.radius`.
pub fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    write(
        root,
        "src/main.c",
        r#"#include <stdio.h>
#include "util.h"

static int square(int x) {
    return x * x;
}

int main(void) {
    printf("%d\n", square(clamp(12, 0, 10)));
    return 0;
}
"#,
    );
    write(
        root,
        "src/util.h",
        r#"#ifndef UTIL_H
#define UTIL_H

static inline int clamp(int v, int lo, int hi) {
    return v < lo ? lo : (v > hi ? hi : v);
}

#endif
"#,
    );
    write(root, "vendor/drop.c", "int dropped(void) { return 1; }\n");
    write(root, "vendor/keep/keep.c", "int kept(void) { return 2; }\n");
    write(
        root,
        "src/shapes.rs",
        r#"pub struct Circle {
    r: f64,
}

impl Circle {
    pub fn new(r: f64) -> Self {
        Circle { r }
    }

    pub fn radius(&self) -> f64 {
        self.r
    }
}

pub fn area(c: &Circle) -> f64 {
    std::f64::consts::PI * c.radius() * c.radius()
}
"#,
    );

    temp_dir
}
