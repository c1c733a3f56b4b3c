//! Preshader programs.
//!
//! A preshader is a constant-folded expression program evaluated on the CPU
//! before a draw. It reads the stage's preshader input registers plus a
//! literal pool and writes derived values into the stage's regular uniform
//! registers. All register files are addressed by scalar component index.

use glam::Vec4;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    Nop,
    Mov,
    Neg,
    Rcp,
    Frc,
    Exp,
    Log,
    Rsq,
    Sin,
    Cos,
    Asin,
    Acos,
    Atan,
    Min,
    Max,
    Lt,
    Ge,
    Add,
    Mul,
    Atan2,
    Div,
    Cmp,
    Movc,
    Dot,
    Noise,
    MinScalar,
    MaxScalar,
    LtScalar,
    GeScalar,
    AddScalar,
    MulScalar,
    Atan2Scalar,
    DivScalar,
    DotScalar,
    NoiseScalar,
}

impl Opcode {
    /// Scalar variants broadcast their first source operand.
    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::MinScalar
                | Self::MaxScalar
                | Self::LtScalar
                | Self::GeScalar
                | Self::AddScalar
                | Self::MulScalar
                | Self::Atan2Scalar
                | Self::DivScalar
                | Self::DotScalar
                | Self::NoiseScalar
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    Input,
    Literal,
    Output,
    Temp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operand {
    pub kind: OperandKind,
    /// Scalar component index into the operand's register file.
    pub index: u32,
}

/// One instruction. The last operand is the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub elements: u32,
    pub operands: Vec<Operand>,
}

/// Named input range of the preshader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreshaderSymbol {
    pub name: String,
    pub register: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preshader {
    pub instructions: Vec<Instruction>,
    pub symbols: Vec<PreshaderSymbol>,
    pub literals: Vec<f32>,
    /// Number of float4 temporary registers.
    pub temporary_count: u32,
}

impl Preshader {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Runs the program, reading `inputs` and writing into `outputs`.
    ///
    /// Out of range operands read as zero and out of range destinations are
    /// dropped.
    pub fn execute(&self, inputs: &[Vec4], outputs: &mut [Vec4]) {
        let inputs: &[f32] = bytemuck::cast_slice(inputs);
        let outputs: &mut [f32] = bytemuck::cast_slice_mut(outputs);
        let mut temps = vec![0.0f32; self.temporary_count as usize * 4];

        for instruction in &self.instructions {
            let Some((destination, sources)) = instruction.operands.split_last() else {
                continue;
            };
            let elements = instruction.elements.clamp(1, 4) as usize;
            let scalar = instruction.opcode.is_scalar();

            let read = |operand: Option<&Operand>, component: usize, temps: &[f32], outputs: &[f32]| {
                let Some(operand) = operand else {
                    return 0.0;
                };
                let base = operand.index as usize;
                match operand.kind {
                    OperandKind::Literal => self.literals.get(base).copied().unwrap_or(0.0),
                    OperandKind::Input => inputs.get(base + component).copied().unwrap_or(0.0),
                    OperandKind::Output => outputs.get(base + component).copied().unwrap_or(0.0),
                    OperandKind::Temp => temps.get(base + component).copied().unwrap_or(0.0),
                }
            };

            let mut result = [0.0f32; 4];
            match instruction.opcode {
                Opcode::Dot | Opcode::DotScalar => {
                    let dot: f32 = (0..elements)
                        .map(|i| {
                            read(sources.first(), i, &temps, outputs)
                                * read(sources.get(1), i, &temps, outputs)
                        })
                        .sum();
                    result = [dot; 4];
                }
                opcode => {
                    for (i, value) in result.iter_mut().enumerate().take(elements) {
                        let first = if scalar { 0 } else { i };
                        let a = read(sources.first(), first, &temps, outputs);
                        let b = read(sources.get(1), i, &temps, outputs);
                        let c = read(sources.get(2), i, &temps, outputs);
                        *value = evaluate(opcode, a, b, c);
                    }
                }
            }

            let base = destination.index as usize;
            let target: &mut [f32] = match destination.kind {
                OperandKind::Output => outputs,
                OperandKind::Temp => &mut temps,
                OperandKind::Input | OperandKind::Literal => {
                    log::warn!("Preshader destination {:?} is read-only", destination.kind);
                    continue;
                }
            };
            for (i, value) in result.iter().enumerate().take(elements) {
                if let Some(slot) = target.get_mut(base + i) {
                    *slot = *value;
                }
            }
        }
    }
}

fn evaluate(opcode: Opcode, a: f32, b: f32, c: f32) -> f32 {
    match opcode {
        Opcode::Nop | Opcode::Movc | Opcode::Noise | Opcode::NoiseScalar => 0.0,
        Opcode::Mov => a,
        Opcode::Neg => -a,
        Opcode::Rcp => {
            if a == 0.0 {
                0.0
            } else {
                1.0 / a
            }
        }
        Opcode::Frc => a.fract().rem_euclid(1.0),
        Opcode::Exp => a.exp(),
        Opcode::Log => a.ln(),
        Opcode::Rsq => 1.0 / a.sqrt(),
        Opcode::Sin => a.sin(),
        Opcode::Cos => a.cos(),
        Opcode::Asin => a.asin(),
        Opcode::Acos => a.acos(),
        Opcode::Atan => a.atan(),
        Opcode::Min | Opcode::MinScalar => a.min(b),
        Opcode::Max | Opcode::MaxScalar => a.max(b),
        Opcode::Lt | Opcode::LtScalar => f32::from(u8::from(a < b)),
        Opcode::Ge | Opcode::GeScalar => f32::from(u8::from(a >= b)),
        Opcode::Add | Opcode::AddScalar => a + b,
        Opcode::Mul | Opcode::MulScalar => a * b,
        Opcode::Atan2 | Opcode::Atan2Scalar => a.atan2(b),
        Opcode::Div | Opcode::DivScalar => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        Opcode::Cmp => {
            if a >= 0.0 {
                b
            } else {
                c
            }
        }
        Opcode::Dot | Opcode::DotScalar => a * b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(kind: OperandKind, index: u32) -> Operand {
        Operand { kind, index }
    }

    #[test]
    fn scalar_multiply_broadcasts_first_operand() {
        let preshader = Preshader {
            instructions: vec![Instruction {
                opcode: Opcode::MulScalar,
                elements: 4,
                operands: vec![
                    op(OperandKind::Literal, 0),
                    op(OperandKind::Input, 0),
                    op(OperandKind::Output, 4),
                ],
            }],
            literals: vec![2.0],
            ..Default::default()
        };
        let inputs = [Vec4::new(1.0, 2.0, 3.0, 4.0)];
        let mut outputs = [Vec4::ZERO; 2];
        preshader.execute(&inputs, &mut outputs);
        assert_eq!(outputs[1], Vec4::new(2.0, 4.0, 6.0, 8.0));
        assert_eq!(outputs[0], Vec4::ZERO);
    }

    #[test]
    fn temporaries_chain_between_instructions() {
        let preshader = Preshader {
            instructions: vec![
                Instruction {
                    opcode: Opcode::Add,
                    elements: 2,
                    operands: vec![
                        op(OperandKind::Input, 0),
                        op(OperandKind::Input, 2),
                        op(OperandKind::Temp, 0),
                    ],
                },
                Instruction {
                    opcode: Opcode::Dot,
                    elements: 2,
                    operands: vec![
                        op(OperandKind::Temp, 0),
                        op(OperandKind::Temp, 0),
                        op(OperandKind::Output, 0),
                    ],
                },
            ],
            temporary_count: 1,
            ..Default::default()
        };
        let inputs = [Vec4::new(1.0, 2.0, 3.0, 4.0)];
        let mut outputs = [Vec4::ZERO];
        preshader.execute(&inputs, &mut outputs);
        // (1+3, 2+4) . (1+3, 2+4) = 16 + 36
        assert_eq!(outputs[0].x, 52.0);
        assert_eq!(outputs[0].y, 52.0);
        assert_eq!(outputs[0].z, 0.0);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        assert_eq!(evaluate(Opcode::Div, 1.0, 0.0, 0.0), 0.0);
        assert_eq!(evaluate(Opcode::Rcp, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(evaluate(Opcode::Cmp, -1.0, 5.0, 7.0), 7.0);
    }
}
