//! Monotonic nonce allocator: one per signing address, assigning nonces
//! in order of admission (§4.5).

use tokio::sync::Mutex;

pub struct NonceAllocator {
    next: Mutex<u64>,
}

impl NonceAllocator {
    pub fn starting_at(confirmed_nonce: u64) -> Self {
        Self { next: Mutex::new(confirmed_nonce) }
    }

    pub async fn allocate(&self) -> u64 {
        let mut next = self.next.lock().await;
        let nonce = *next;
        *next += 1;
        nonce
    }

    pub async fn peek(&self) -> u64 {
        *self.next.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocates_in_order() {
        let allocator = NonceAllocator::starting_at(5);
        assert_eq!(allocator.allocate().await, 5);
        assert_eq!(allocator.allocate().await, 6);
        assert_eq!(allocator.allocate().await, 7);
    }
}
