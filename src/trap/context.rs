//! # 陷入上下文
//!
//! 用户程序的寄存器文件。寄存器编号沿用模拟处理器的约定：
//!
//! | 寄存器 | 编号 | 用途 |
//! |--------|------|------|
//! | v0 | 2 | 系统调用号 / 返回值 |
//! | a0-a3 | 4-7 | 参数 |
//! | sp | 29 | 栈指针 |
//! | ra | 31 | 返回地址 |
//! | pc | 34 | 当前指令地址 |
//! | next pc | 35 | 下一条指令地址 |

use crate::config::{
    NUM_USER_REGISTERS, REG_A0, REG_A1, REG_NEXT_PC, REG_PC, REG_SP,
};

/// 陷入上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapContext {
    /// 全部用户寄存器
    pub x: [i32; NUM_USER_REGISTERS],
}

impl TrapContext {
    /// 设置栈指针
    pub fn set_sp(&mut self, sp: usize) {
        self.x[REG_SP] = sp as i32;
    }

    pub fn pc(&self) -> usize {
        self.x[REG_PC] as u32 as usize
    }

    /// 跳过触发陷入的指令：`pc <- next_pc`，`next_pc += 4`
    pub fn advance_pc(&mut self) {
        self.x[REG_PC] = self.x[REG_NEXT_PC];
        self.x[REG_NEXT_PC] = self.x[REG_NEXT_PC].wrapping_add(4);
    }

    /// 创建用户程序的初始上下文
    ///
    /// 除入口地址、栈指针和 `argc`/`argv`（a0/a1）外，所有寄存器清零。
    pub fn app_init_context(entry: usize, sp: usize, argc: usize, argv: usize) -> Self {
        let mut cx = Self {
            x: [0; NUM_USER_REGISTERS],
        };
        cx.x[REG_PC] = entry as i32;
        cx.x[REG_NEXT_PC] = entry.wrapping_add(4) as i32;
        cx.set_sp(sp);
        cx.x[REG_A0] = argc as i32;
        cx.x[REG_A1] = argv as i32;
        cx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REG_V0;

    #[test]
    fn initial_context_zeroes_everything_else() {
        let cx = TrapContext::app_init_context(0x100, 0x2000, 2, 0x2400);
        assert_eq!(cx.pc(), 0x100);
        assert_eq!(cx.x[REG_NEXT_PC], 0x104);
        assert_eq!(cx.x[REG_SP], 0x2000);
        assert_eq!((cx.x[REG_A0], cx.x[REG_A1]), (2, 0x2400));
        let set = [REG_PC, REG_NEXT_PC, REG_SP, REG_A0, REG_A1];
        assert!((0..NUM_USER_REGISTERS)
            .filter(|r| !set.contains(r))
            .all(|r| cx.x[r] == 0));
        assert_eq!(cx.x[REG_V0], 0);
    }

    #[test]
    fn advance_moves_to_next_instruction() {
        let mut cx = TrapContext::app_init_context(0x100, 0, 0, 0);
        cx.advance_pc();
        assert_eq!(cx.pc(), 0x104);
        assert_eq!(cx.x[REG_NEXT_PC], 0x108);
    }
}
