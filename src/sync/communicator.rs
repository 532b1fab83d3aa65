//! # 会合通信器
//!
//! 说话者与收听者之间一对一交接单个字的同步原语。
//!
//! ## 语义
//!
//! - [`Communicator::speak`] 阻塞直到恰好一个收听者取走了这个字
//! - [`Communicator::listen`] 阻塞直到某个说话者交出一个字
//! - 字从不进入共享缓冲区：每个字要么直接交给一个已在等待的对方，
//!   要么随说话者一起排队，不会出现无人认领的字
//!
//! ## 实现
//!
//! 一把互斥锁保护两条 FIFO 等待队列（等待中的说话者、等待中的收听者）。
//! 每个等待者持有私有的槽位和条件变量，配对成功的一方直接写入对方的槽位
//! 并只唤醒对方。

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// 等待者私有的交接槽位
struct Slot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

struct SlotState {
    /// 说话者槽位：待交出的字；收听者槽位：收到的字
    word: Option<i32>,
    /// 交接已完成
    done: bool,
}

impl Slot {
    fn new(word: Option<i32>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState { word, done: false }),
            cond: Condvar::new(),
        })
    }

    /// 收听者一侧：把字交给正在等待的收听者
    fn deliver(&self, word: i32) {
        let mut state = self.state.lock();
        state.word = Some(word);
        state.done = true;
        self.cond.notify_one();
    }

    /// 说话者一侧：取走正在等待的说话者的字
    fn take(&self) -> i32 {
        let mut state = self.state.lock();
        let word = state.word.take().expect("queued speaker without a word");
        state.done = true;
        self.cond.notify_one();
        word
    }

    /// 阻塞直到交接完成，返回槽位中留下的字
    fn wait(&self) -> Option<i32> {
        let mut state = self.state.lock();
        while !state.done {
            self.cond.wait(&mut state);
        }
        state.word.take()
    }
}

#[derive(Default)]
struct Queues {
    speakers: VecDeque<Arc<Slot>>,
    listeners: VecDeque<Arc<Slot>>,
}

/// 会合通信器
///
/// ## Examples
///
/// ```
/// use std::sync::Arc;
/// use userprog::sync::Communicator;
///
/// let comm = Arc::new(Communicator::new());
/// let speaker = {
///     let comm = comm.clone();
///     std::thread::spawn(move || comm.speak(7))
/// };
/// assert_eq!(comm.listen(), 7);
/// speaker.join().unwrap();
/// ```
#[derive(Default)]
pub struct Communicator {
    queues: Mutex<Queues>,
}

impl Communicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 交出一个字，直到某个收听者收到后才返回
    pub fn speak(&self, word: i32) {
        let mut queues = self.queues.lock();
        if let Some(listener) = queues.listeners.pop_front() {
            drop(queues);
            listener.deliver(word);
            return;
        }
        let slot = Slot::new(Some(word));
        queues.speakers.push_back(slot.clone());
        drop(queues);
        slot.wait();
    }

    /// 等待并返回某个说话者交出的字
    pub fn listen(&self) -> i32 {
        let mut queues = self.queues.lock();
        if let Some(speaker) = queues.speakers.pop_front() {
            drop(queues);
            return speaker.take();
        }
        let slot = Slot::new(None);
        queues.listeners.push_back(slot.clone());
        drop(queues);
        slot.wait().expect("listener woken without a word")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn speaker_blocks_until_heard() {
        let comm = Arc::new(Communicator::new());
        let heard = Arc::new(AtomicUsize::new(0));
        let speaker = {
            let comm = comm.clone();
            let heard = heard.clone();
            thread::spawn(move || {
                comm.speak(11);
                assert_eq!(heard.load(Ordering::SeqCst), 1);
            })
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!speaker.is_finished());
        heard.store(1, Ordering::SeqCst);
        assert_eq!(comm.listen(), 11);
        speaker.join().unwrap();
    }

    #[test]
    fn every_word_reaches_exactly_one_listener() {
        let comm = Arc::new(Communicator::new());
        let listeners: Vec<_> = (0..4)
            .map(|_| {
                let comm = comm.clone();
                thread::spawn(move || comm.listen())
            })
            .collect();
        let speakers: Vec<_> = (0..4)
            .map(|word| {
                let comm = comm.clone();
                thread::spawn(move || comm.speak(word))
            })
            .collect();

        for speaker in speakers {
            speaker.join().unwrap();
        }
        let mut words: Vec<i32> = listeners.into_iter().map(|l| l.join().unwrap()).collect();
        words.sort_unstable();
        assert_eq!(words, [0, 1, 2, 3]);
    }
}
