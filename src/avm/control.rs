//! Memory, environment and control-flow opcodes

use crate::avm::addressing::Addressing;
use crate::avm::context::ExecutionContext;
use crate::avm::instruction::{Address, CalldataCopy, Jump, Return, Revert, Sender, Set};
use crate::avm::vm::{Exit, Flow, Vm, VmError};
use crate::crypto::HashBackend;
use crate::memory::{Cell, Tag};
use ark_bn254::Fr;

impl<B: HashBackend> Vm<B> {
    pub(super) fn exec_set(&self, inst: &Set, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let tag = Tag::from_byte(inst.tag).ok_or(VmError::InvalidTag(inst.tag))?;
        let memory = ctx.memory_mut();
        let [dst] = Addressing::from_wire(inst.indirect, 1).resolve([inst.dst_offset], memory)?;
        memory.set(dst, Cell::from_u128(tag, inst.value));
        Ok(Flow::Next)
    }

    pub(super) fn exec_calldata_copy(
        &self,
        inst: &CalldataCopy,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, VmError> {
        let [start_offset, size_offset, dst] = Addressing::from_wire(inst.indirect, 3).resolve(
            [inst.cd_start_offset, inst.copy_size_offset, inst.dst_offset],
            ctx.memory(),
        )?;
        let start = ctx.memory().read::<u32>(start_offset)?;
        let size = ctx.memory().read::<u32>(size_offset)?;
        ctx.consume_gas(u64::from(size).saturating_mul(self.config.gas.calldata_per_element))?;

        let calldata = &ctx.env().calldata;
        let values = (start as usize)
            .checked_add(size as usize)
            .and_then(|end| calldata.get(start as usize..end))
            .ok_or(VmError::CalldataOutOfRange {
                start,
                size,
                available: calldata.len(),
            })?
            .to_vec();

        ctx.memory_mut().write_slice(dst, &values)?;
        Ok(Flow::Next)
    }

    pub(super) fn exec_address(&self, inst: &Address, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let address = ctx.env().address;
        write_env_field(ctx, inst.indirect, inst.dst_offset, address)
    }

    pub(super) fn exec_sender(&self, inst: &Sender, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let sender = ctx.env().sender;
        write_env_field(ctx, inst.indirect, inst.dst_offset, sender)
    }

    pub(super) fn exec_jump(&self, inst: &Jump, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let target = inst.loc as usize;
        if target >= ctx.bytecode().len() {
            return Err(VmError::InvalidJump(inst.loc));
        }
        Ok(Flow::Jump(target))
    }

    pub(super) fn exec_return(&self, inst: &Return, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let output = self.read_output(ctx, inst.indirect, inst.ret_offset, inst.ret_size)?;
        Ok(Flow::Exit(Exit::Return(output)))
    }

    pub(super) fn exec_revert(&self, inst: &Revert, ctx: &mut ExecutionContext) -> Result<Flow, VmError> {
        let output = self.read_output(ctx, inst.indirect, inst.ret_offset, inst.ret_size)?;
        Ok(Flow::Exit(Exit::Revert(output)))
    }

    /// Read `size` field cells for RETURN / REVERT
    fn read_output(
        &self,
        ctx: &mut ExecutionContext,
        indirect: u8,
        offset: u32,
        size: u32,
    ) -> Result<Vec<Cell>, VmError> {
        let [offset] = Addressing::from_wire(indirect, 1).resolve([offset], ctx.memory())?;
        ctx.consume_gas(u64::from(size).saturating_mul(self.config.gas.return_per_element))?;
        Ok(ctx.memory().get_slice(offset, size, Tag::Field)?)
    }
}

fn write_env_field(
    ctx: &mut ExecutionContext,
    indirect: u8,
    dst_offset: u32,
    value: Fr,
) -> Result<Flow, VmError> {
    let memory = ctx.memory_mut();
    let [dst] = Addressing::from_wire(indirect, 1).resolve([dst_offset], memory)?;
    memory.write(dst, value);
    Ok(Flow::Next)
}
