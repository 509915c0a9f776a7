//! Benchmarks for the metadata backbone.
//!
//! Tests parsing performance for the structures on the hot path of loading
//! a CLI image:
//! - The .NET directory (COR20) header, read and write
//! - The metadata root and its stream directory
//! - Permission set decoding (binary and XML formats)

extern crate cilmeta;

use cilmeta::metadata::{cor20::NetDirectory, root::Root, security::PermissionSet};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

#[rustfmt::skip]
fn crafted_header() -> Vec<u8> {
    vec![
        0x48, 0x00, 0x00, 0x00, // cb = 72
        0x02, 0x00,             // major_runtime_version = 2
        0x05, 0x00,             // minor_runtime_version = 5
        0x00, 0x10, 0x00, 0x00, // metadata rva = 0x1000
        0x40, 0x00, 0x00, 0x00, // metadata size = 64
        0x01, 0x00, 0x00, 0x00, // flags = IL_ONLY
        0x01, 0x00, 0x00, 0x06, // entry_point_token = MethodDef row 1
        0x80, 0x10, 0x00, 0x00, // resources rva = 0x1080
        0x20, 0x00, 0x00, 0x00, // resources size = 0x20
        0xC0, 0x10, 0x00, 0x00, // strong name rva = 0x10C0
        0x08, 0x00, 0x00, 0x00, // strong name size = 8
        0x00, 0x00, 0x00, 0x00, // code manager table (reserved)
        0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, // vtable fixups
        0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, // export address table jumps (reserved)
        0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, // managed native header
        0x00, 0x00, 0x00, 0x00,
    ]
}

fn crafted_root() -> Vec<u8> {
    let mut data = vec![0_u8; 64];
    data[0..4].copy_from_slice(&[0x42, 0x53, 0x4A, 0x42]); // BSJB
    data[4..6].copy_from_slice(&[0x01, 0x00]); // major
    data[6..8].copy_from_slice(&[0x01, 0x00]); // minor
    data[12..16].copy_from_slice(&[0x04, 0x00, 0x00, 0x00]); // version length = 4
    data[16..20].copy_from_slice(b"v4.0");
    data[22..24].copy_from_slice(&[0x01, 0x00]); // one stream
    data[24..28].copy_from_slice(&[0x30, 0x00, 0x00, 0x00]); // stream offset = 0x30
    data[28..32].copy_from_slice(&[0x04, 0x00, 0x00, 0x00]); // stream size = 4
    data[32..35].copy_from_slice(b"#~\0");
    data
}

/// A legacy binary permission set carrying one `SecurityPermission` with an
/// `Unrestricted = true` property.
fn crafted_binary_permission_set() -> Vec<u8> {
    let class_name = b"System.Security.Permissions.SecurityPermission";

    let mut data = vec![b'.', 0x01];
    data.push(class_name.len() as u8);
    data.extend_from_slice(class_name);

    let blob_start = data.len() + 1;
    data.push(0x00); // blob length placeholder
    data.push(0x01); // 1 property

    data.push(0x54); // field marker
    data.push(0x02); // boolean
    data.push(12);
    data.extend_from_slice(b"Unrestricted");
    data.push(0x01); // true

    let blob_length = data.len() - blob_start;
    data[blob_start - 1] = blob_length as u8;
    data
}

/// Benchmark reading the 72-byte COR20 header, including all validation.
fn bench_netdirectory_read(c: &mut Criterion) {
    let header = crafted_header();

    c.bench_function("netdirectory_read", |b| {
        b.iter(|| {
            let directory = NetDirectory::read(black_box(&header), None).unwrap();
            black_box(directory)
        });
    });
}

/// Benchmark serializing a parsed header back into its fixed layout.
fn bench_netdirectory_write(c: &mut Criterion) {
    let header = crafted_header();
    let directory = NetDirectory::read(&header, None).unwrap();
    let mut out = vec![0_u8; directory.physical_size()];

    c.bench_function("netdirectory_write", |b| {
        b.iter(|| {
            let mut offset = 0;
            directory.write(black_box(&mut out), &mut offset).unwrap();
            black_box(offset)
        });
    });
}

/// Benchmark parsing the metadata root and its stream directory.
fn bench_root_read(c: &mut Criterion) {
    let root = crafted_root();

    c.bench_function("root_read", |b| {
        b.iter(|| {
            let parsed = Root::read(black_box(&root)).unwrap();
            black_box(parsed)
        });
    });
}

/// Benchmark decoding a legacy binary permission set with one property.
fn bench_permission_set_binary(c: &mut Criterion) {
    let blob = crafted_binary_permission_set();

    c.bench_function("permission_set_binary", |b| {
        b.iter(|| {
            let set = PermissionSet::new(black_box(&blob)).unwrap();
            black_box(set)
        });
    });
}

/// Benchmark decoding an XML permission set with two permissions.
fn bench_permission_set_xml(c: &mut Criterion) {
    let xml: &[u8] = br#"<PermissionSet class="System.Security.PermissionSet" version="1">
        <IPermission class="System.Security.Permissions.SecurityPermission, mscorlib" version="1" Unrestricted="true"/>
        <IPermission class="System.Security.Permissions.FileIOPermission, mscorlib" version="1" Read="C:\data"/>
    </PermissionSet>"#;

    c.bench_function("permission_set_xml", |b| {
        b.iter(|| {
            let set = PermissionSet::new(black_box(xml)).unwrap();
            black_box(set)
        });
    });
}

criterion_group!(
    benches,
    bench_netdirectory_read,
    bench_netdirectory_write,
    bench_root_read,
    bench_permission_set_binary,
    bench_permission_set_xml,
);
criterion_main!(benches);
