pub const DEFAULT_CURSOR_SPEED: i32 = 5000;

/// 鼠标模式下上一次的笔坐标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    pub last_x: i32,
    pub last_y: i32,
    /// 本会话内是否已经记录过坐标
    pub primed: bool,
}

/// 把笔的绝对坐标转换为鼠标的相对位移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorEmulator {
    pub speed: i32,
    pub max_pos: i32,
    /// 为 `true` 时会话内的第一个采样只用来记录基准点;
    /// 为 `false` 时以 (0, 0) 为基准, 第一次会产生一个大跳跃
    pub seed_from_first_sample: bool,
}

impl CursorEmulator {
    pub fn new(speed: i32, max_pos: i32) -> Self {
        Self {
            speed,
            max_pos,
            seed_from_first_sample: true,
        }
    }

    pub fn delta(&self, pen_x: i32, pen_y: i32, state: &mut CursorState) -> (i32, i32) {
        if self.seed_from_first_sample && !state.primed {
            *state = CursorState {
                last_x: pen_x,
                last_y: pen_y,
                primed: true,
            };
            return (0, 0);
        }
        delta(pen_x, pen_y, state, self.speed, self.max_pos)
    }
}

/// `speed * (pen - last) / max_pos`, 截断取整
///
/// 无论结果如何都会把 `state` 更新为当前坐标
pub fn delta(
    pen_x: i32,
    pen_y: i32,
    state: &mut CursorState,
    speed: i32,
    max_pos: i32,
) -> (i32, i32) {
    let scale = |now: i32, last: i32| -> i32 {
        if max_pos == 0 {
            return 0;
        }
        let moved = speed as i64 * (now as i64 - last as i64) / max_pos as i64;
        moved.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    };

    let dx = scale(pen_x, state.last_x);
    let dy = scale(pen_y, state.last_y);
    *state = CursorState {
        last_x: pen_x,
        last_y: pen_y,
        primed: true,
    };
    (dx, dy)
}
