#![no_main]
use hmsearch::HmIndex;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must either fail cleanly or yield an
    // index whose searches do not panic.
    let Ok(index) = HmIndex::from_bytes(data) else {
        return;
    };

    let length = index.length() as usize;
    let query = vec![0u32; length];
    for range in 0..8u32 {
        let mut hits = Vec::new();
        let _ = index.search(&query, range, |id| hits.push(id));
    }

    // A decoded index must reproduce its own encoding.
    let bytes = index.to_bytes();
    assert_eq!(bytes.as_slice(), data);
});
