//! Hot-path benchmarks using Criterion: page-aligned and boundary-crossing
//! copies, zero-fill reads and discard sweeps.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rambrick_core::{Device, IoRequest, PAGE_SIZE};

const DEVICE_PAGES: u64 = 1024;

fn device() -> Device {
    Device::new(0, DEVICE_PAGES * PAGE_SIZE as u64).expect("device creation")
}

fn benchmark_write(c: &mut Criterion) {
    let device = device();
    let data = vec![0xA5_u8; PAGE_SIZE];

    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Bytes(PAGE_SIZE as u64));

    group.bench_function("page_aligned", |b| {
        let mut page = 0u64;
        b.iter(|| {
            let mut req = IoRequest::write((page % DEVICE_PAGES) * 8, vec![&data[..]]);
            device.submit(&mut req).expect("write");
            page += 1;
        });
    });

    group.bench_function("boundary_crossing", |b| {
        let mut page = 0u64;
        b.iter(|| {
            // Last sector of one page into the first of the next.
            let sector = (page % (DEVICE_PAGES - 1)) * 8 + 7;
            let mut req = IoRequest::write(sector, vec![&data[..1024]]);
            device.submit(&mut req).expect("write");
            page += 1;
        });
    });

    group.finish();
}

fn benchmark_read(c: &mut Criterion) {
    let device = device();
    let data = vec![0x5A_u8; PAGE_SIZE];

    // Populate half the device so both hit and zero-fill paths run.
    for page in 0..DEVICE_PAGES / 2 {
        let mut req = IoRequest::write(page * 8, vec![&data[..]]);
        device.submit(&mut req).expect("populate");
    }

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(PAGE_SIZE as u64));

    group.bench_function("resident", |b| {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut page = 0u64;
        b.iter(|| {
            let mut req = IoRequest::read((page % (DEVICE_PAGES / 2)) * 8, vec![&mut buf[..]]);
            device.submit(&mut req).expect("read");
            black_box(&buf);
            page += 1;
        });
    });

    group.bench_function("zero_fill", |b| {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut page = DEVICE_PAGES / 2;
        b.iter(|| {
            let sector = (DEVICE_PAGES / 2 + page % (DEVICE_PAGES / 2)) * 8;
            let mut req = IoRequest::read(sector, vec![&mut buf[..]]);
            device.submit(&mut req).expect("read");
            black_box(&buf);
            page += 1;
        });
    });

    group.finish();
}

fn benchmark_discard(c: &mut Criterion) {
    let device = device();
    let data = vec![0xEE_u8; PAGE_SIZE];
    for page in 0..DEVICE_PAGES {
        let mut req = IoRequest::write(page * 8, vec![&data[..]]);
        device.submit(&mut req).expect("populate");
    }

    let mut group = c.benchmark_group("discard");
    group.throughput(Throughput::Bytes(16 * PAGE_SIZE as u64));

    group.bench_function("sixteen_pages", |b| {
        let mut start = 0u64;
        b.iter(|| {
            let page = start % (DEVICE_PAGES - 16);
            let mut req = IoRequest::discard(page * 8, 16 * PAGE_SIZE);
            device.submit(&mut req).expect("discard");
            start += 16;
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_write, benchmark_read, benchmark_discard);
criterion_main!(benches);
