use rand::{Rng, RngCore};

use blockraid::{Array, BlockDevice, MemoryDisk, Scheme, BLOCK_SIZE};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    for scheme in Scheme::ALL {
        for devices in scheme.min_devices()..scheme.min_devices() + 4 {
            fuzz_test(scheme, devices, 32, 500);
        }
    }
}

fn memory_array(scheme: Scheme, devices: usize, device_blocks: u64) -> Array {
    let devices = (0..devices)
        .map(|i| Box::new(MemoryDisk::new(format!("mem{i}"), device_blocks)) as Box<dyn BlockDevice>)
        .collect();
    Array::new(devices, scheme).unwrap()
}

fn fuzz_test(scheme: Scheme, devices: usize, device_blocks: u64, rounds: usize) {
    println!("Fuzz {scheme} with {devices} devices");
    let mut rng = rand::thread_rng();
    let array = memory_array(scheme, devices, device_blocks);
    let capacity = array.capacity_blocks();
    let mut data = vec![[0u8; BLOCK_SIZE]; capacity as usize];

    for _ in 0..rounds {
        let block = rng.gen_range(0..capacity);
        let mut changed_data = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut changed_data);
        array.write(block, &changed_data).unwrap();
        data[block as usize] = changed_data;

        let sample = rng.gen_range(0..capacity);
        assert_eq!(array.read(sample).unwrap()[..], data[sample as usize][..]);

        let stripe = array.locate(block).unwrap().block;
        assert!(array.check_parity(stripe).unwrap());
    }

    let data_read: Vec<_> = (0..capacity).map(|i| *array.read(i).unwrap()).collect();
    assert_eq!(data_read, data);
    for stripe in 0..array.device_blocks() {
        assert!(array.check_parity(stripe).unwrap());
    }
}
