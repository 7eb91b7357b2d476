//! Hashing opcodes
//!
//! Every handler resolves its operands, reads all of its inputs and only then
//! writes its output, so an output region may overlap an input region and a
//! failed read leaves memory untouched.

use crate::avm::addressing::Addressing;
use crate::avm::context::ExecutionContext;
use crate::avm::instruction::{KeccakF1600, Keccak, Pedersen, Poseidon2, Sha256Compression};
use crate::avm::vm::{Flow, Vm, VmError};
use crate::crypto::{HashBackend, KECCAKF1600_LANES, POSEIDON2_WIDTH, SHA256_BLOCK_WORDS, SHA256_STATE_WORDS};
use ark_bn254::Fr;

impl<B: HashBackend> Vm<B> {
    pub(super) fn exec_poseidon2(&self, inst: &Poseidon2, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let [input, output] = Addressing::from_wire(inst.indirect, 2).resolve(
            [
                u32::from(inst.input_state_offset),
                u32::from(inst.output_state_offset),
            ],
            ctx.memory(),
        )?;

        let state = ctx.memory().read_array::<Fr, POSEIDON2_WIDTH>(input)?;
        let permuted = self.backend.poseidon2_permutation(&state);
        ctx.memory_mut().write_slice(output, &permuted)?;
        Ok(Flow::Next)
    }

    pub(super) fn exec_keccak(&self, inst: &Keccak, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let [dst, message, size_offset] = Addressing::from_wire(inst.indirect, 3).resolve(
            [
                inst.dst_offset,
                u32::from(inst.message_offset),
                u32::from(inst.message_size_offset),
            ],
            ctx.memory(),
        )?;

        let size = ctx.memory().read::<u32>(size_offset)?;
        ctx.consume_gas(u64::from(size).saturating_mul(self.config.gas.keccak_per_byte))?;
        let bytes = ctx.memory().read_slice::<u8>(message, size)?;

        let digest = self.backend.keccak256(&bytes);
        ctx.memory_mut().write_slice(dst, &digest)?;
        Ok(Flow::Next)
    }

    /// The size operand must be a U32 cell, but the permutation always
    /// covers the full 25 lanes.
    pub(super) fn exec_keccakf1600(&self, inst: &KeccakF1600, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let [dst, message, size_offset] = Addressing::from_wire(inst.indirect, 3).resolve(
            [
                u32::from(inst.dst_offset),
                u32::from(inst.message_offset),
                u32::from(inst.message_size_offset),
            ],
            ctx.memory(),
        )?;

        ctx.memory().read::<u32>(size_offset)?;
        let mut lanes = ctx.memory().read_array::<u64, KECCAKF1600_LANES>(message)?;
        self.backend.keccakf1600(&mut lanes);
        ctx.memory_mut().write_slice(dst, &lanes)?;
        Ok(Flow::Next)
    }

    pub(super) fn exec_sha256_compression(
        &self,
        inst: &Sha256Compression,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, VmError> {
        let [dst, state_offset, state_size_offset, inputs_offset, inputs_size_offset] =
            Addressing::from_wire(inst.indirect, 5).resolve(
                [
                    u32::from(inst.dst_offset),
                    u32::from(inst.state_offset),
                    u32::from(inst.state_size_offset),
                    u32::from(inst.inputs_offset),
                    u32::from(inst.inputs_size_offset),
                ],
                ctx.memory(),
            )?;

        let memory = ctx.memory();
        expect_region_size(memory.read::<u32>(state_size_offset)?, SHA256_STATE_WORDS)?;
        expect_region_size(memory.read::<u32>(inputs_size_offset)?, SHA256_BLOCK_WORDS)?;
        let state = memory.read_array::<u32, SHA256_STATE_WORDS>(state_offset)?;
        let block = memory.read_array::<u32, SHA256_BLOCK_WORDS>(inputs_offset)?;

        let output = self.backend.sha256_compression(&state, &block);
        ctx.memory_mut().write_slice(dst, &output)?;
        Ok(Flow::Next)
    }

    pub(super) fn exec_pedersen(&self, inst: &Pedersen, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let [gen_index_offset, dst, message, size_offset] = Addressing::from_wire(inst.indirect, 4).resolve(
            [
                inst.gen_index_offset,
                inst.dst_offset,
                inst.message_offset,
                inst.message_size_offset,
            ],
            ctx.memory(),
        )?;

        let generator_index = ctx.memory().read::<u32>(gen_index_offset)?;
        let size = ctx.memory().read::<u32>(size_offset)?;
        ctx.consume_gas(u64::from(size).saturating_mul(self.config.gas.pedersen_per_element))?;
        let inputs = ctx.memory().read_slice::<Fr>(message, size)?;

        let hash = self.backend.pedersen_hash(&inputs, generator_index);
        ctx.memory_mut().write(dst, hash);
        Ok(Flow::Next)
    }
}

fn expect_region_size(declared: u32, expected: usize) -> Result<(), VmError> {
    if declared as usize != expected {
        return Err(VmError::RegionSizeMismatch {
            expected: expected as u32,
            declared,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::avm::addressing::{Addressing, AddressingMode};
    use crate::avm::context::{Environment, ExecutionContext};
    use crate::avm::instruction::{Instruction, KeccakF1600, Keccak, Pedersen, Poseidon2, Sha256Compression};
    use crate::avm::vm::{ErrorKind, ExecutionResult, Halt, Vm, VmError};
    use crate::config::VmConfig;
    use crate::crypto::{self, HashBackend, KECCAKF1600_LANES};
    use crate::memory::Tag;
    use crate::test_utils::{field_from_hex, program, random_bytes, random_words, TestBackend};
    use ark_bn254::Fr;
    use proptest::prelude::*;
    use rand::Rng;
    use std::sync::Mutex;

    const DIRECT: AddressingMode = AddressingMode::Direct;
    const INDIRECT: AddressingMode = AddressingMode::Indirect;

    fn run(inst: Instruction, setup: impl FnOnce(&mut ExecutionContext)) -> (ExecutionResult, ExecutionContext) {
        let vm = Vm::new(TestBackend);
        let mut ctx = vm.context(program(&[inst]), Environment::default());
        setup(&mut ctx);
        let result = vm.execute(&mut ctx);
        (result, ctx)
    }

    fn all(mode: AddressingMode, count: usize) -> u8 {
        Addressing::new(&vec![mode; count]).to_wire()
    }

    /// Returns a recorded BN254 Poseidon2 output and remembers the state it
    /// was asked to permute.
    #[derive(Default)]
    struct RecordedPoseidon2 {
        seen: Mutex<Option<[Fr; 4]>>,
    }

    impl HashBackend for RecordedPoseidon2 {
        fn poseidon2_permutation(&self, state: &[Fr; 4]) -> [Fr; 4] {
            *self.seen.lock().unwrap() = Some(*state);
            [
                "0x224785a48a72c75e2cbb698143e71d5d41bd89a2b9a7185871e39a54ce5785b1",
                "0x225bb800db22c4f4b09ace45cb484d42b0dd7dfe8708ee26aacde6f2c1fb2cb8",
                "0x1180f4260e60b4264c987b503075ea8374b53ed06c5145f8c21c2aadb5087d21",
                "0x16c877b5b9c04d873218804ccbf65d0eeb12db447f66c9ca26fec380055df7e9",
            ]
            .map(field_from_hex)
        }

        fn pedersen_hash(&self, _inputs: &[Fr], _generator_index: u32) -> Fr {
            Fr::from(0u64)
        }
    }

    #[test]
    fn test_poseidon2_forwards_state_and_writes_backend_output() {
        let backend = RecordedPoseidon2::default();
        let vm = Vm::new(&backend);
        let inst = Poseidon2 {
            indirect: 0,
            input_state_offset: 0,
            output_state_offset: 4,
        };
        let mut ctx = vm.context(program(&[inst.into()]), Environment::default());
        let input: Vec<Fr> = (1..=4u64).map(Fr::from).collect();
        ctx.memory_mut().write_slice(0, &input).unwrap();

        let result = vm.execute(&mut ctx);

        assert!(result.success());
        assert_eq!(
            *backend.seen.lock().unwrap(),
            Some([1u64, 2, 3, 4].map(Fr::from))
        );
        assert_eq!(
            ctx.memory().read_array::<Fr, 4>(4).unwrap(),
            backend.poseidon2_permutation(&[1u64, 2, 3, 4].map(Fr::from))
        );
        assert_eq!(ctx.memory().tag_at(7), Tag::Field);
    }

    #[test]
    fn test_poseidon2_writes_permutation_of_arbitrary_state() {
        let mut rng = rand::thread_rng();
        let input: [Fr; 4] = std::array::from_fn(|_| Fr::from(rng.gen::<u64>()));
        let inst = Poseidon2 {
            indirect: 0,
            input_state_offset: 20,
            output_state_offset: 30,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write_slice(20, &input).unwrap();
        });

        assert!(result.success());
        assert_eq!(
            ctx.memory().read_array::<Fr, 4>(30).unwrap(),
            TestBackend.poseidon2_permutation(&input)
        );
        assert_eq!(ctx.memory().read_array::<Fr, 4>(20).unwrap(), input);
    }

    #[test]
    fn test_poseidon2_indirect_matches_direct() {
        let input: Vec<Fr> = (1..=4u64).map(Fr::from).collect();
        let direct = Poseidon2 {
            indirect: all(DIRECT, 2),
            input_state_offset: 100,
            output_state_offset: 200,
        };
        let (_, direct_ctx) = run(direct.into(), |ctx| {
            ctx.memory_mut().write_slice(100, &input).unwrap();
        });

        let indirect = Poseidon2 {
            indirect: all(INDIRECT, 2),
            input_state_offset: 0,
            output_state_offset: 1,
        };
        let (result, indirect_ctx) = run(indirect.into(), |ctx| {
            ctx.memory_mut().write(0, 100u32);
            ctx.memory_mut().write(1, 200u32);
            ctx.memory_mut().write_slice(100, &input).unwrap();
        });

        assert!(result.success());
        assert_eq!(
            indirect_ctx.memory().read_array::<Fr, 4>(200).unwrap(),
            direct_ctx.memory().read_array::<Fr, 4>(200).unwrap()
        );
    }

    #[test]
    fn test_poseidon2_in_place() {
        let inst = Poseidon2 {
            indirect: 0,
            input_state_offset: 10,
            output_state_offset: 10,
        };
        let input = [Fr::from(9u64); 4];
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write_slice(10, &input).unwrap();
        });
        assert!(result.success());
        assert_eq!(
            ctx.memory().read_array::<Fr, 4>(10).unwrap(),
            TestBackend.poseidon2_permutation(&input)
        );
    }

    #[test]
    fn test_keccak_matches_primitive() {
        let message = random_bytes(10);
        let inst = Keccak {
            indirect: 0,
            dst_offset: 200,
            message_offset: 0,
            message_size_offset: 50,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write_slice(0, &message).unwrap();
            ctx.memory_mut().write(50, message.len() as u32);
        });

        assert!(result.success());
        assert_eq!(
            ctx.memory().read_slice::<u8>(200, 32).unwrap(),
            crypto::keccak256(&message).to_vec()
        );

        let gas = VmConfig::default().gas;
        assert_eq!(result.gas_used, gas.keccak + 10 * gas.keccak_per_byte);
    }

    #[test]
    fn test_keccak_empty_message() {
        let inst = Keccak {
            indirect: 0,
            dst_offset: 10,
            message_offset: 0,
            message_size_offset: 5,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write(5, 0u32);
        });

        assert!(result.success());
        assert_eq!(
            hex::encode(ctx.memory().read_slice::<u8>(10, 32).unwrap()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_indirect_matches_direct() {
        let message = random_bytes(10);
        let direct = Keccak {
            indirect: 0,
            dst_offset: 300,
            message_offset: 100,
            message_size_offset: 150,
        };
        let (_, direct_ctx) = run(direct.into(), |ctx| {
            ctx.memory_mut().write_slice(100, &message).unwrap();
            ctx.memory_mut().write(150, 10u32);
        });

        let indirect = Keccak {
            indirect: all(INDIRECT, 3),
            dst_offset: 0,
            message_offset: 1,
            message_size_offset: 2,
        };
        let (result, indirect_ctx) = run(indirect.into(), |ctx| {
            ctx.memory_mut().write_slice(0, &[300u32, 100, 150]).unwrap();
            ctx.memory_mut().write_slice(100, &message).unwrap();
            ctx.memory_mut().write(150, 10u32);
        });

        assert!(result.success());
        assert_eq!(
            indirect_ctx.memory().read_slice::<u8>(300, 32).unwrap(),
            direct_ctx.memory().read_slice::<u8>(300, 32).unwrap()
        );
    }

    #[test]
    fn test_keccak_size_is_charged_before_reading() {
        let inst = Keccak {
            indirect: 0,
            dst_offset: 0,
            message_offset: 0,
            message_size_offset: 1,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write(1, u32::MAX);
        });
        assert_eq!(result.halt, Halt::OutOfGas);
        assert_eq!(result.gas_used, VmConfig::default().gas.keccak);
        assert_eq!(ctx.memory().tag_at(0), Tag::U32);
    }

    #[test]
    fn test_keccak_message_past_address_space() {
        let inst = Keccak {
            indirect: all(INDIRECT, 3) & 0b010,
            dst_offset: 100,
            message_offset: 0,
            message_size_offset: 1,
        };
        let (result, _) = run(inst.into(), |ctx| {
            ctx.memory_mut().write(0, u32::MAX - 2);
            ctx.memory_mut().write(1, 8u32);
        });
        assert_eq!(result.error().map(VmError::kind), Some(ErrorKind::AddressOverflow));
    }

    #[test]
    fn test_keccakf1600_zero_state() {
        let inst = KeccakF1600 {
            indirect: 0,
            dst_offset: 100,
            message_offset: 0,
            message_size_offset: 50,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write_slice(0, &[0u64; KECCAKF1600_LANES]).unwrap();
            ctx.memory_mut().write(50, KECCAKF1600_LANES as u32);
        });

        assert!(result.success());
        let lanes = ctx.memory().read_array::<u64, KECCAKF1600_LANES>(100).unwrap();
        assert_eq!(lanes[0], 0xF1258F7940E1DDE7);

        let mut expected = [0u64; KECCAKF1600_LANES];
        crypto::keccakf1600(&mut expected);
        assert_eq!(lanes, expected);
    }

    #[test]
    fn test_keccakf1600_ignores_declared_size() {
        let lanes: Vec<u64> = (0..KECCAKF1600_LANES as u64).collect();
        let run_with_size = |size: u32| {
            let inst = KeccakF1600 {
                indirect: 0,
                dst_offset: 0,
                message_offset: 0,
                message_size_offset: 60,
            };
            let (result, ctx) = run(inst.into(), |ctx| {
                ctx.memory_mut().write_slice(0, &lanes).unwrap();
                ctx.memory_mut().write(60, size);
            });
            assert!(result.success());
            ctx.memory().read_array::<u64, KECCAKF1600_LANES>(0).unwrap()
        };
        assert_eq!(run_with_size(3), run_with_size(25));
    }

    #[test]
    fn test_keccakf1600_indirect_matches_direct() {
        let lanes: Vec<u64> = (0..KECCAKF1600_LANES as u64).map(|i| i * 0x0101).collect();
        let direct = KeccakF1600 {
            indirect: 0,
            dst_offset: 200,
            message_offset: 100,
            message_size_offset: 150,
        };
        let (_, direct_ctx) = run(direct.into(), |ctx| {
            ctx.memory_mut().write_slice(100, &lanes).unwrap();
            ctx.memory_mut().write(150, 25u32);
        });

        let indirect = KeccakF1600 {
            indirect: all(INDIRECT, 3),
            dst_offset: 0,
            message_offset: 1,
            message_size_offset: 2,
        };
        let (result, indirect_ctx) = run(indirect.into(), |ctx| {
            ctx.memory_mut().write_slice(0, &[200u32, 100, 150]).unwrap();
            ctx.memory_mut().write_slice(100, &lanes).unwrap();
            ctx.memory_mut().write(150, 25u32);
        });

        assert!(result.success());
        assert_eq!(
            indirect_ctx.memory().read_array::<u64, 25>(200).unwrap(),
            direct_ctx.memory().read_array::<u64, 25>(200).unwrap()
        );
    }

    fn sha256_setup(ctx: &mut ExecutionContext, state: &[u32], block: &[u32]) {
        let memory = ctx.memory_mut();
        memory.write_slice(0, state).unwrap();
        memory.write(50, state.len() as u32);
        memory.write_slice(100, block).unwrap();
        memory.write(150, block.len() as u32);
    }

    fn sha256_at(dst: u16) -> Sha256Compression {
        Sha256Compression {
            indirect: 0,
            dst_offset: dst,
            state_offset: 0,
            state_size_offset: 50,
            inputs_offset: 100,
            inputs_size_offset: 150,
        }
    }

    #[test]
    fn test_sha256_compression_matches_primitive() {
        let state = random_words::<8>();
        let block = random_words::<16>();
        let expected = crypto::sha256_compression(&state, &block);

        for dst in [200, 0, 100] {
            let (result, ctx) = run(sha256_at(dst).into(), |ctx| sha256_setup(ctx, &state, &block));
            assert!(result.success());
            assert_eq!(
                ctx.memory().read_array::<u32, 8>(u32::from(dst)).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_sha256_compression_indirect_matches_direct() {
        let state = random_words::<8>();
        let block = random_words::<16>();
        let indirect = Sha256Compression {
            indirect: all(INDIRECT, 5),
            dst_offset: 20,
            state_offset: 21,
            state_size_offset: 22,
            inputs_offset: 23,
            inputs_size_offset: 24,
        };
        let (result, ctx) = run(indirect.into(), |ctx| {
            sha256_setup(ctx, &state, &block);
            ctx.memory_mut().write_slice(20, &[200u32, 0, 50, 100, 150]).unwrap();
        });

        assert!(result.success());
        assert_eq!(
            ctx.memory().read_array::<u32, 8>(200).unwrap(),
            crypto::sha256_compression(&state, &block)
        );
    }

    #[test]
    fn test_sha256_compression_size_mismatch() {
        let state = random_words::<8>();
        let block = random_words::<16>();
        let (result, ctx) = run(sha256_at(200).into(), |ctx| {
            sha256_setup(ctx, &state, &block);
            ctx.memory_mut().write(150, 15u32);
        });

        assert_eq!(
            result.halt,
            Halt::Reverted(VmError::RegionSizeMismatch {
                expected: 16,
                declared: 15
            })
        );
        assert_eq!(result.error().map(VmError::kind), Some(ErrorKind::AddressOverflow));
        assert_eq!(ctx.memory().tag_at(200), Tag::U32);
        assert_eq!(ctx.memory().read::<u32>(200).unwrap(), 0);
    }

    #[test]
    fn test_pedersen() {
        let inputs: Vec<Fr> = (1..=3u64).map(Fr::from).collect();
        let inst = Pedersen {
            indirect: 0,
            gen_index_offset: 10,
            dst_offset: 3,
            message_offset: 0,
            message_size_offset: 11,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write_slice(0, &inputs).unwrap();
            ctx.memory_mut().write(10, 0u32);
            ctx.memory_mut().write(11, 3u32);
        });

        assert!(result.success());
        assert_eq!(
            ctx.memory().read::<Fr>(3).unwrap(),
            TestBackend.pedersen_hash(&inputs, 0)
        );
        let gas = VmConfig::default().gas;
        assert_eq!(result.gas_used, gas.pedersen + 3 * gas.pedersen_per_element);
    }

    #[test]
    fn test_pedersen_generator_index_separates() {
        let inputs = [Fr::from(5u64), Fr::from(6u64)];
        assert_ne!(
            TestBackend.pedersen_hash(&inputs, 0),
            TestBackend.pedersen_hash(&inputs, 1)
        );

        let hash_with = |index: u32| {
            let inst = Pedersen {
                indirect: 0,
                gen_index_offset: 10,
                dst_offset: 20,
                message_offset: 0,
                message_size_offset: 11,
            };
            let (_, ctx) = run(inst.into(), |ctx| {
                ctx.memory_mut().write_slice(0, &inputs).unwrap();
                ctx.memory_mut().write(10, index);
                ctx.memory_mut().write(11, 2u32);
            });
            ctx.memory().read::<Fr>(20).unwrap()
        };
        assert_eq!(hash_with(7), TestBackend.pedersen_hash(&inputs, 7));
    }

    #[test]
    fn test_pedersen_mixed_addressing() {
        let inputs: Vec<Fr> = (1..=3u64).map(Fr::from).collect();
        let inst = Pedersen {
            indirect: Addressing::new(&[DIRECT, DIRECT, INDIRECT, INDIRECT]).to_wire(),
            gen_index_offset: 10,
            dst_offset: 3,
            message_offset: 20,
            message_size_offset: 21,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write_slice(0, &inputs).unwrap();
            ctx.memory_mut().write(10, 0u32);
            ctx.memory_mut().write(11, 3u32);
            ctx.memory_mut().write(20, 0u32);
            ctx.memory_mut().write(21, 11u32);
        });

        assert!(result.success());
        assert_eq!(
            ctx.memory().read::<Fr>(3).unwrap(),
            TestBackend.pedersen_hash(&inputs, 0)
        );
    }

    #[test]
    fn test_pedersen_rejects_integer_input() {
        let inst = Pedersen {
            indirect: 0,
            gen_index_offset: 10,
            dst_offset: 30,
            message_offset: 0,
            message_size_offset: 11,
        };
        let (result, ctx) = run(inst.into(), |ctx| {
            ctx.memory_mut().write(0, Fr::from(1u64));
            ctx.memory_mut().write(1, 2u8);
            ctx.memory_mut().write(10, 0u32);
            ctx.memory_mut().write(11, 2u32);
        });

        assert_eq!(result.error().map(VmError::kind), Some(ErrorKind::TagMismatch));
        assert_eq!(ctx.memory().tag_at(30), Tag::U32);
    }

    proptest! {
        #[test]
        fn prop_keccak_addressing_equivalence(
            message in proptest::collection::vec(any::<u8>(), 0..64),
            base in 1000u32..60_000,
        ) {
            let size = message.len() as u32;
            let dst = base + 2_000;
            let size_at = base - 1;

            let direct = Keccak {
                indirect: 0,
                dst_offset: dst,
                message_offset: base as u16,
                message_size_offset: size_at as u16,
            };
            let (direct_result, direct_ctx) = run(direct.into(), |ctx| {
                ctx.memory_mut().write_slice(base, &message).unwrap();
                ctx.memory_mut().write(size_at, size);
            });

            let indirect = Keccak {
                indirect: all(INDIRECT, 3),
                dst_offset: 0,
                message_offset: 1,
                message_size_offset: 2,
            };
            let (indirect_result, indirect_ctx) = run(indirect.into(), |ctx| {
                ctx.memory_mut().write_slice(0, &[dst, base, size_at]).unwrap();
                ctx.memory_mut().write_slice(base, &message).unwrap();
                ctx.memory_mut().write(size_at, size);
            });

            prop_assert!(direct_result.success());
            prop_assert!(indirect_result.success());
            prop_assert_eq!(
                direct_ctx.memory().read_slice::<u8>(dst, 32).unwrap(),
                indirect_ctx.memory().read_slice::<u8>(dst, 32).unwrap()
            );
        }
    }
}
