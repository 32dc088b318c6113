use afl::fuzz;
use crcfold::{Digest, Fallback, Tier, CRC_32_ISCSI, CRC_64_XZ};

fn main() {
    let digest_init = Digest::new(&CRC_64_XZ);
    fuzz!(|data: &[u8]| {
        let mut digest = digest_init.clone();
        digest.write(data);
        let expected = CRC_64_XZ.update_portable(!0, data, Fallback::Bytewise);
        assert_eq!(digest.sum(), !expected);

        let expected = CRC_32_ISCSI.update_portable(!0, data, Fallback::Sliced);
        for tier in Tier::ALL {
            if let Some(crc) = CRC_32_ISCSI.update_with_tier(tier, !0, data) {
                assert_eq!(crc, expected, "tier {tier}");
            }
        }
    });
}
